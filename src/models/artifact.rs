use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Category;

/// Final cleaned text unit for one section or course record of one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalArtifact {
    pub patient_id: String,
    pub category: Category,
    /// Position within a multi-record category, 1-based. `None` when the
    /// category produced a single artifact for this patient.
    pub ordinal: Option<usize>,
    pub text: String,
}

impl CanonicalArtifact {
    /// File name used by the artifact store: `<category>.txt` or `<category>-<n>.txt`.
    pub fn file_name(&self) -> String {
        match self.ordinal {
            Some(n) => format!("{}-{}.txt", self.category.as_str(), n),
            None => format!("{}.txt", self.category.as_str()),
        }
    }

    /// Human-readable heading, e.g. `日常病程记录3`.
    pub fn title(&self) -> String {
        match self.ordinal {
            Some(n) => format!("{}{}", self.category.label(), n),
            None => self.category.label().to_string(),
        }
    }

    /// Inverse of [`file_name`](Self::file_name). Returns `None` for foreign files.
    pub fn parse_file_name(name: &str) -> Option<(Category, Option<usize>)> {
        let stem = name.strip_suffix(".txt")?;
        if let Ok(category) = Category::from_str(stem) {
            return Some((category, None));
        }
        let (head, ordinal) = stem.rsplit_once('-')?;
        let category = Category::from_str(head).ok()?;
        let ordinal = ordinal.parse::<usize>().ok()?;
        Some((category, Some(ordinal)))
    }
}
