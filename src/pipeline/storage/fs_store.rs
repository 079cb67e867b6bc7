use std::io::Write;
use std::path::{Path, PathBuf};

use super::{ArtifactStore, StorageError};
use crate::models::CanonicalArtifact;

/// Filesystem layout: `<root>/<patient_id>/<category>[-<n>].txt`.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patient_dir(&self, patient_id: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_component(patient_id) {
            return Err(StorageError::InvalidPatientId(patient_id.to_string()));
        }
        Ok(self.root.join(patient_id))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, artifact: &CanonicalArtifact) -> Result<PathBuf, StorageError> {
        let path = self.patient_dir(&artifact.patient_id)?.join(artifact.file_name());
        write_atomic(&path, &artifact.text)?;
        tracing::debug!(
            category = %artifact.category,
            ordinal = ?artifact.ordinal,
            chars = artifact.text.chars().count(),
            "Artifact written"
        );
        Ok(path)
    }

    fn clear_patient(&self, patient_id: &str) -> Result<usize, StorageError> {
        let dir = self.patient_dir(patient_id)?;
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0usize;
        for path in read_dir(&dir)? {
            let is_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(CanonicalArtifact::parse_file_name)
                .is_some();
            if !is_artifact || !path.is_file() {
                continue;
            }
            std::fs::remove_file(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            removed += 1;
        }
        if removed > 0 {
            tracing::debug!(patient_id = %patient_id, removed, "Stale artifacts removed");
        }
        Ok(removed)
    }

    fn patients(&self) -> Result<Vec<String>, StorageError> {
        let mut ids: Vec<String> = read_dir(&self.root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn load_patient(&self, patient_id: &str) -> Result<Vec<CanonicalArtifact>, StorageError> {
        let dir = self.patient_dir(patient_id)?;
        if !dir.is_dir() {
            return Err(StorageError::PatientNotFound(patient_id.to_string()));
        }

        let mut artifacts = Vec::new();
        for path in read_dir(&dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((category, ordinal)) = CanonicalArtifact::parse_file_name(name) else {
                continue;
            };
            let text = std::fs::read_to_string(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            artifacts.push(CanonicalArtifact {
                patient_id: patient_id.to_string(),
                category,
                ordinal,
                text,
            });
        }

        artifacts.sort_by_key(|a| (a.category, a.ordinal));
        Ok(artifacts)
    }
}

/// Write `content` to `path` as a whole: temp file in the same directory,
/// then rename. Readers never observe a partial file.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let io_err = |source| StorageError::Io {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()).map_err(io_err))
        .collect()
}

fn is_safe_component(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.chars().any(char::is_control)
}
