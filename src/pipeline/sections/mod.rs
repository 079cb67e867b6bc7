//! Colon-delimited section extraction with per-kind exclusion rules.

pub mod extractor;
pub mod rules;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::DocumentKind;

pub use extractor::{extract, extract_text, section_title};

/// Section-title substrings to suppress, keyed by document kind.
///
/// A kind with no entry suppresses nothing. Serialized as a plain JSON
/// object, e.g. `{"discharge": ["医师签名"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionRules(BTreeMap<DocumentKind, Vec<String>>);

impl ExclusionRules {
    /// No exclusions for any kind.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn for_kind(&self, kind: DocumentKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the exclusion list of one kind.
    pub fn set(&mut self, kind: DocumentKind, titles: Vec<String>) {
        self.0.insert(kind, titles);
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        fn owned(titles: &[&str]) -> Vec<String> {
            titles.iter().map(|t| t.to_string()).collect()
        }
        let mut map = BTreeMap::new();
        map.insert(
            DocumentKind::Admission,
            owned(&["问诊", "既往史", "个人史", "婚育史", "月经史", "家族史", "体格检查"]),
        );
        map.insert(
            DocumentKind::FirstCourse,
            owned(&["体格检查", "中医鉴别诊断", "西医鉴别诊断", "病例分型"]),
        );
        map.insert(DocumentKind::Discharge, owned(&["医师签名"]));
        Self(map)
    }
}
