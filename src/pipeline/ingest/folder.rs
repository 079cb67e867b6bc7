use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

use super::decode::{decode_with_fallback, resolve_encodings};
use super::{DocumentSource, IngestBatch, IngestError};
use crate::models::{Document, DocumentKind};
use crate::pipeline::report::{SkipReason, SkippedUnit};

/// Reads `<root>/<patient_id>/<kind>.txt`.
///
/// File stems `入院`, `出院`, `首程` and `病程` map to their document kinds;
/// any other `.txt` file is ingested as `other`. Patients and files are
/// visited in name order.
pub struct PatientFolderSource {
    root: PathBuf,
    encodings: Vec<&'static Encoding>,
}

impl PatientFolderSource {
    pub fn new(root: impl Into<PathBuf>, encoding_labels: &[String]) -> Result<Self, IngestError> {
        Ok(Self {
            root: root.into(),
            encodings: resolve_encodings(encoding_labels)?,
        })
    }

    /// Read one patient folder. Unreadable folders and files are recorded as
    /// skips so the remaining patients still load.
    fn load_patient(&self, dir: &Path, patient_id: &str, batch: &mut IngestBatch) {
        let entries = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                batch.skipped.push(unreadable(dir, e));
                return;
            }
        };
        for path in entries {
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let kind = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(DocumentKind::from_file_stem)
                .unwrap_or(DocumentKind::Other);

            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(source) => {
                    let e = IngestError::Io {
                        path: path.clone(),
                        source,
                    };
                    batch.skipped.push(unreadable(&path, e));
                    continue;
                }
            };

            let Some((text, encoding)) = decode_with_fallback(&bytes, &self.encodings) else {
                batch.skipped.push(SkippedUnit {
                    unit: path.display().to_string(),
                    reason: SkipReason::DecodeFailure,
                    detail: format!("none of {} candidate encodings matched", self.encodings.len()),
                });
                continue;
            };

            tracing::debug!(kind = %kind, encoding, bytes = bytes.len(), "Document decoded");

            match Document::new(patient_id, kind, text) {
                Ok(document) => batch.push(document),
                Err(e) => batch.skipped.push(SkippedUnit {
                    unit: path.display().to_string(),
                    reason: SkipReason::MissingIdentifier,
                    detail: e.to_string(),
                }),
            }
        }
    }
}

impl DocumentSource for PatientFolderSource {
    fn describe(&self) -> String {
        format!("patient folders under {}", self.root.display())
    }

    fn load(&self) -> Result<IngestBatch, IngestError> {
        if !self.root.is_dir() {
            return Err(IngestError::NotFound(self.root.clone()));
        }

        let mut batch = IngestBatch::default();
        for dir in sorted_entries(&self.root)? {
            if !dir.is_dir() {
                continue;
            }
            let Some(patient_id) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                batch.skipped.push(SkippedUnit {
                    unit: dir.display().to_string(),
                    reason: SkipReason::MissingIdentifier,
                    detail: "folder name is not valid UTF-8".into(),
                });
                continue;
            };
            self.load_patient(&dir, &patient_id, &mut batch);
        }

        tracing::info!(
            patients = batch.patients.len(),
            documents = batch.document_count(),
            skipped = batch.skipped.len(),
            "Patient folders loaded"
        );
        Ok(batch)
    }
}

fn unreadable(path: &Path, error: IngestError) -> SkippedUnit {
    SkippedUnit {
        unit: path.display().to_string(),
        reason: SkipReason::Unreadable,
        detail: error.to_string(),
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let io_err = |source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}
