//! Sub-section trimming rules, applied to a titled line in fixed order.
//!
//! Each rule checks its own title marker and rewrites the line only when
//! its structural marker is found; otherwise the line passes through.

const PAST_HISTORY: &str = "既往";
const SPECIALIST_EXAM: &str = "专科检查";
const PHYSICAL_EXAM: &str = "体格检查";
const PHYSICAL_EXAM_SHORT: &str = "体查";
const VITAL_SIGNS: &str = "T:";

/// One named trimming rule.
#[derive(Debug, Clone, Copy)]
pub struct TrimRule {
    pub name: &'static str,
    /// Substring the section title must contain for the rule to run.
    pub title_marker: &'static str,
    /// A line this rule rewrote is retained even if its title is excluded.
    pub survives_exclusion: bool,
    trim: fn(&str) -> Option<String>,
}

impl TrimRule {
    pub fn applies_to(&self, title: &str) -> bool {
        title.contains(self.title_marker)
    }

    /// Rewritten line, or `None` when the rule's marker is absent.
    pub fn trim(&self, line: &str) -> Option<String> {
        (self.trim)(line)
    }
}

pub const RULES: &[TrimRule] = &[
    TrimRule {
        name: "history_tail",
        title_marker: "病史",
        survives_exclusion: false,
        trim: truncate_past_history,
    },
    TrimRule {
        name: "specialist_span",
        title_marker: PHYSICAL_EXAM,
        survives_exclusion: true,
        trim: specialist_span,
    },
    TrimRule {
        name: "admission_exam",
        title_marker: "入院情况",
        survives_exclusion: false,
        trim: excise_exam_or_vitals,
    },
    TrimRule {
        name: "admission_tail",
        title_marker: "入院情况",
        survives_exclusion: false,
        trim: truncate_past_history,
    },
    TrimRule {
        name: "discharge_exam",
        title_marker: "出院情况",
        survives_exclusion: false,
        trim: excise_exam,
    },
];

/// Outcome of running every applicable rule over one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trimmed {
    pub line: String,
    /// Set when a rule with `survives_exclusion` rewrote the line.
    pub rescued: bool,
}

/// Run [`RULES`] in order over `line`, each conditioned on `title`.
pub fn apply_rules(title: &str, line: &str) -> Trimmed {
    let mut current = line.to_string();
    let mut rescued = false;
    for rule in RULES.iter().filter(|r| r.applies_to(title)) {
        if let Some(trimmed) = rule.trim(&current) {
            tracing::trace!(rule = rule.name, "Trim rule applied");
            rescued |= rule.survives_exclusion;
            current = trimmed;
        }
    }
    Trimmed {
        line: current,
        rescued,
    }
}

/// Drop everything from the first `既往`.
pub fn truncate_past_history(line: &str) -> Option<String> {
    line.find(PAST_HISTORY).map(|at| line[..at].to_string())
}

/// Keep only the span starting at `专科检查`.
pub fn specialist_span(line: &str) -> Option<String> {
    line.find(SPECIALIST_EXAM).map(|at| line[at..].to_string())
}

/// Cut the physical-exam block out of a status line.
pub fn excise_exam(line: &str) -> Option<String> {
    let start = exam_marker(line)?;
    Some(excise_from(line, start))
}

/// Like [`excise_exam`], falling back to the `T:` vital-signs marker.
pub fn excise_exam_or_vitals(line: &str) -> Option<String> {
    let start = exam_marker(line).or_else(|| line.find(VITAL_SIGNS))?;
    Some(excise_from(line, start))
}

/// Rightmost of the two physical-exam spellings.
fn exam_marker(line: &str) -> Option<usize> {
    line.find(PHYSICAL_EXAM).max(line.find(PHYSICAL_EXAM_SHORT))
}

/// Remove `[start, 专科检查)` when the specialist marker follows `start`,
/// otherwise truncate at `start`.
fn excise_from(line: &str, start: usize) -> String {
    match line.find(SPECIALIST_EXAM) {
        Some(end) if end > start => format!("{}{}", &line[..start], &line[end..]),
        _ => line[..start].to_string(),
    }
}
