//! Document ingestion: patient folder trees and JSON-lines row exports.

pub mod decode;
pub mod folder;
pub mod rows;

pub use decode::{decode_with_fallback, resolve_encodings};
pub use folder::PatientFolderSource;
pub use rows::JsonlRowSource;

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Document;
use crate::pipeline::report::SkippedUnit;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Input not found: {0}")]
    NotFound(PathBuf),

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),
}

/// All documents of one patient, in input order.
#[derive(Debug, Clone)]
pub struct PatientDocuments {
    pub patient_id: String,
    pub documents: Vec<Document>,
}

/// Everything a source could read, plus what it had to skip.
#[derive(Debug, Default)]
pub struct IngestBatch {
    pub patients: Vec<PatientDocuments>,
    pub skipped: Vec<SkippedUnit>,
}

impl IngestBatch {
    pub fn document_count(&self) -> usize {
        self.patients.iter().map(|p| p.documents.len()).sum()
    }

    /// Append `document` to its patient's group, creating the group on first sight.
    pub(crate) fn push(&mut self, document: Document) {
        match self
            .patients
            .iter_mut()
            .find(|p| p.patient_id == document.patient_id())
        {
            Some(group) => group.documents.push(document),
            None => self.patients.push(PatientDocuments {
                patient_id: document.patient_id().to_string(),
                documents: vec![document],
            }),
        }
    }
}

/// A source of raw documents grouped by patient.
///
/// Per-unit problems (undecodable file, row without patient id) go into
/// [`IngestBatch::skipped`]; only failures that make the whole source
/// unreadable are returned as errors.
pub trait DocumentSource {
    fn describe(&self) -> String;

    fn load(&self) -> Result<IngestBatch, IngestError>;
}
