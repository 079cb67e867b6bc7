//! Artifact persistence: one text file per artifact under a patient directory.

pub mod fs_store;

pub use fs_store::{write_atomic, FsArtifactStore};

use std::path::PathBuf;

use thiserror::Error;

use crate::models::CanonicalArtifact;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Patient id cannot be used as a directory name: {0:?}")]
    InvalidPatientId(String),

    #[error("Patient not found in store: {0}")]
    PatientNotFound(String),
}

/// Where canonical artifacts are written and read back from.
pub trait ArtifactStore {
    /// Persist one artifact as a whole. Returns the location written.
    fn save(&self, artifact: &CanonicalArtifact) -> Result<PathBuf, StorageError>;

    /// Remove every artifact previously stored for one patient, so a re-run
    /// leaves only its own output. Other files are left alone. Returns the
    /// number removed.
    fn clear_patient(&self, patient_id: &str) -> Result<usize, StorageError>;

    /// Patient ids present in the store, sorted.
    fn patients(&self) -> Result<Vec<String>, StorageError>;

    /// All artifacts of one patient in category order, then ordinal.
    fn load_patient(&self, patient_id: &str) -> Result<Vec<CanonicalArtifact>, StorageError>;
}
