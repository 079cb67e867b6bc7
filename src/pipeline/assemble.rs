//! Merge one patient's artifacts into a single record in fixed category order.

use std::sync::LazyLock;

use regex::Regex;

use super::normalize::normalize;
use crate::models::{CanonicalArtifact, Category};

/// Merged record file name prefix, followed by the patient id.
pub const MERGED_FILE_PREFIX: &str = "整合病历_";

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

pub fn merged_file_name(patient_id: &str) -> String {
    format!("{MERGED_FILE_PREFIX}{patient_id}.txt")
}

/// Concatenate `artifacts` under `【label】` headings.
///
/// Categories follow [`Category::ORDER`]; within a category artifacts are
/// ordered by ordinal. Each artifact becomes one `title：content` line with
/// its content flattened onto that line. Categories without artifacts get
/// no heading. No text is rewritten beyond whitespace.
pub fn assemble(artifacts: &[CanonicalArtifact]) -> String {
    let mut out = String::new();

    for category in Category::ORDER {
        let mut members: Vec<&CanonicalArtifact> = artifacts
            .iter()
            .filter(|a| a.category == category)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by_key(|a| a.ordinal);

        out.push_str(&format!("\n【{}】\n", category.label()));
        for artifact in members {
            out.push_str(&format!("{}：{}\n", artifact.title(), flatten(&artifact.text)));
        }
    }

    NEWLINE_RUN.replace_all(&out, "\n\n").trim().to_string()
}

/// Collapse every whitespace run, line breaks included, to one space.
fn flatten(text: &str) -> String {
    WHITESPACE_RUN.replace_all(&normalize(text), " ").into_owned()
}
