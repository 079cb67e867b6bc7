use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a unit of input was left out of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No candidate encoding decoded the bytes.
    DecodeFailure,
    /// Row or folder had no usable patient key.
    MissingIdentifier,
    /// A row could not be parsed at all.
    MalformedRow,
    /// A file or patient folder could not be read.
    Unreadable,
    /// An artifact could not be written.
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUnit {
    /// File path, `file:line`, or patient id identifying the unit.
    pub unit: String,
    pub reason: SkipReason,
    pub detail: String,
}

/// Summary of one batch run. Written next to the output as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub run_id: Uuid,
    pub patients: usize,
    pub documents: usize,
    pub artifacts: usize,
    pub skipped: Vec<SkippedUnit>,
}

impl ProcessingReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            patients: 0,
            documents: 0,
            artifacts: 0,
            skipped: Vec::new(),
        }
    }

    pub fn skip(&mut self, unit: impl Into<String>, reason: SkipReason, detail: impl Into<String>) {
        let unit = unit.into();
        let detail = detail.into();
        tracing::warn!(unit = %unit, reason = ?reason, detail = %detail, "Unit skipped");
        self.skipped.push(SkippedUnit {
            unit,
            reason,
            detail,
        });
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }
}

impl Default for ProcessingReport {
    fn default() -> Self {
        Self::new()
    }
}
