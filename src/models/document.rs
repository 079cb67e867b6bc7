use serde::Serialize;

use super::{DocumentKind, ModelError};

/// One raw text record for one patient and record type.
///
/// Immutable once built; the constructor is the only place a patient key
/// is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    patient_id: String,
    kind: DocumentKind,
    text: String,
}

impl Document {
    /// Build a document. Fails with `MissingIdentifier` when the patient key is blank.
    pub fn new(
        patient_id: impl Into<String>,
        kind: DocumentKind,
        text: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let patient_id = patient_id.into().trim().to_string();
        if patient_id.is_empty() {
            return Err(ModelError::MissingIdentifier);
        }
        Ok(Self {
            patient_id,
            kind,
            text: text.into(),
        })
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
