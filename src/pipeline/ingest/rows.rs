use std::path::PathBuf;
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::Deserialize;

use super::decode::{decode_with_fallback, resolve_encodings};
use super::{DocumentSource, IngestBatch, IngestError};
use crate::models::{Document, DocumentKind};
use crate::pipeline::report::{SkipReason, SkippedUnit};

/// One exported row: `{"patient_id": "0001", "kind": "admission", "text": "..."}`.
#[derive(Debug, Deserialize)]
struct RawRow {
    /// Hospital exports carry the key as a string or a bare number.
    #[serde(default)]
    patient_id: Option<serde_json::Value>,
    kind: String,
    #[serde(default)]
    text: String,
}

/// Reads a JSON-lines export, one document per line.
///
/// `kind` accepts the snake_case tag (`first_course`) or the file stem
/// used by hospital exports (`首程`). Blank lines are ignored.
pub struct JsonlRowSource {
    path: PathBuf,
    encodings: Vec<&'static Encoding>,
}

impl JsonlRowSource {
    pub fn new(path: impl Into<PathBuf>, encoding_labels: &[String]) -> Result<Self, IngestError> {
        Ok(Self {
            path: path.into(),
            encodings: resolve_encodings(encoding_labels)?,
        })
    }

    fn unit(&self, line_no: usize) -> String {
        format!("{}:{}", self.path.display(), line_no)
    }
}

impl DocumentSource for JsonlRowSource {
    fn describe(&self) -> String {
        format!("JSON-lines rows in {}", self.path.display())
    }

    fn load(&self) -> Result<IngestBatch, IngestError> {
        if !self.path.is_file() {
            return Err(IngestError::NotFound(self.path.clone()));
        }
        let bytes = std::fs::read(&self.path).map_err(|source| IngestError::Io {
            path: self.path.clone(),
            source,
        })?;

        let mut batch = IngestBatch::default();
        let Some((content, encoding)) = decode_with_fallback(&bytes, &self.encodings) else {
            batch.skipped.push(SkippedUnit {
                unit: self.path.display().to_string(),
                reason: SkipReason::DecodeFailure,
                detail: format!("none of {} candidate encodings matched", self.encodings.len()),
            });
            return Ok(batch);
        };
        tracing::debug!(encoding, bytes = bytes.len(), "Row export decoded");

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;

            let row: RawRow = match serde_json::from_str(line) {
                Ok(row) => row,
                Err(e) => {
                    batch.skipped.push(SkippedUnit {
                        unit: self.unit(line_no),
                        reason: SkipReason::MalformedRow,
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            let kind = parse_kind(&row.kind);
            let patient_id = row.patient_id.as_ref().map(identifier_text).unwrap_or_default();

            match Document::new(patient_id, kind, row.text) {
                Ok(document) => batch.push(document),
                Err(e) => batch.skipped.push(SkippedUnit {
                    unit: self.unit(line_no),
                    reason: SkipReason::MissingIdentifier,
                    detail: e.to_string(),
                }),
            }
        }

        tracing::info!(
            patients = batch.patients.len(),
            documents = batch.document_count(),
            skipped = batch.skipped.len(),
            "Row export loaded"
        );
        Ok(batch)
    }
}

fn parse_kind(raw: &str) -> DocumentKind {
    let raw = raw.trim();
    DocumentKind::from_str(raw).unwrap_or_else(|_| DocumentKind::from_file_stem(raw))
}

fn identifier_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
