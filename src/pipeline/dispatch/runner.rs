use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use super::client::LlmClient;
use super::prompt::PromptCatalog;
use super::{is_retryable_error, DispatchError};
use crate::config::DispatchConfig;
use crate::models::CanonicalArtifact;
use crate::pipeline::storage::{write_atomic, ArtifactStore, FsArtifactStore};

/// Suffix appended to an artifact's file stem for its persisted response.
pub const RESPONSE_SUFFIX: &str = "_response.txt";

/// Bounded retries with exponential backoff: `base`, `2·base`, `4·base`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_retry_delay_ms),
        }
    }

    /// Wait before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Static partition of the sorted patient list across dispatcher instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    index: usize,
    count: usize,
}

impl Shard {
    pub fn new(index: usize, count: usize) -> Result<Self, DispatchError> {
        if count == 0 || index >= count {
            return Err(DispatchError::InvalidShard { index, count });
        }
        Ok(Self { index, count })
    }

    /// A single instance covering every patient.
    pub fn whole() -> Self {
        Self { index: 0, count: 1 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Contiguous slice of `total` items owned by this instance:
    /// `ceil(total / count)` per instance, the last one possibly shorter or empty.
    pub fn range(&self, total: usize) -> Range<usize> {
        let per_instance = total.div_ceil(self.count);
        let start = (self.index * per_instance).min(total);
        let end = (start + per_instance).min(total);
        start..end
    }
}

/// Counts for one dispatcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub patients: usize,
    pub sent: usize,
    pub already_done: usize,
    pub no_prompt: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    client: Box<dyn LlmClient + Send + Sync>,
    prompts: PromptCatalog,
    retry: RetryPolicy,
    request_delay: Duration,
    responses: FsArtifactStore,
}

impl Dispatcher {
    pub fn new(
        client: Box<dyn LlmClient + Send + Sync>,
        prompts: PromptCatalog,
        retry: RetryPolicy,
        request_delay: Duration,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            prompts,
            retry,
            request_delay,
            responses: FsArtifactStore::new(output_root),
        }
    }

    /// Where the response for `artifact` is persisted.
    pub fn response_path(&self, artifact: &CanonicalArtifact) -> Result<PathBuf, DispatchError> {
        let file_name = artifact.file_name();
        let stem = file_name.strip_suffix(".txt").unwrap_or(&file_name);
        Ok(self
            .responses
            .patient_dir(&artifact.patient_id)?
            .join(format!("{stem}{RESPONSE_SUFFIX}")))
    }

    /// Send every artifact of this shard's patients that has no response yet.
    ///
    /// A patient or artifact that fails is counted and skipped; only an
    /// unreadable store aborts the run.
    pub fn run(&self, store: &dyn ArtifactStore, shard: Shard) -> Result<DispatchSummary, DispatchError> {
        let patients = store.patients()?;
        let range = shard.range(patients.len());
        tracing::info!(
            instance = shard.index(),
            total_patients = patients.len(),
            start = range.start,
            end = range.end,
            "Dispatch shard assigned"
        );

        let mut summary = DispatchSummary::default();
        for patient_id in &patients[range] {
            summary.patients += 1;
            let artifacts = match store.load_patient(patient_id) {
                Ok(artifacts) => artifacts,
                Err(e) => {
                    tracing::warn!(patient_id = %patient_id, error = %e, "Patient artifacts unreadable");
                    summary.failed += 1;
                    continue;
                }
            };
            for artifact in &artifacts {
                self.dispatch_one(artifact, &mut summary);
            }
        }

        tracing::info!(
            sent = summary.sent,
            already_done = summary.already_done,
            no_prompt = summary.no_prompt,
            failed = summary.failed,
            "Dispatch complete"
        );
        Ok(summary)
    }

    fn dispatch_one(&self, artifact: &CanonicalArtifact, summary: &mut DispatchSummary) {
        let unit = format!("{}/{}", artifact.patient_id, artifact.file_name());

        let path = match self.response_path(artifact) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(unit = %unit, error = %e, "Response path rejected");
                summary.failed += 1;
                return;
            }
        };
        if path.exists() {
            tracing::debug!(unit = %unit, "Response exists, skipping");
            summary.already_done += 1;
            return;
        }

        let prompt = match self.prompts.compose(artifact.category, &artifact.text) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(unit = %unit, error = %e, "Skipping artifact");
                summary.no_prompt += 1;
                return;
            }
        };

        match self.send_with_retry(&prompt, &unit) {
            Ok(completion) => match persist(&path, &completion) {
                Ok(()) => {
                    tracing::info!(unit = %unit, chars = completion.chars().count(), "Response saved");
                    summary.sent += 1;
                    std::thread::sleep(self.request_delay);
                }
                Err(e) => {
                    tracing::error!(unit = %unit, error = %e, "Response could not be written");
                    summary.failed += 1;
                }
            },
            Err(e) => {
                tracing::error!(unit = %unit, error = %e, "LLM call failed, skipping artifact");
                summary.failed += 1;
            }
        }
    }

    fn send_with_retry(&self, prompt: &str, unit: &str) -> Result<String, DispatchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.client.complete(prompt) {
                Ok(completion) => return Ok(completion),
                Err(e) if is_retryable_error(&e) && attempt + 1 < max_attempts => {
                    let wait = self.retry.delay_for(attempt);
                    tracing::warn!(
                        unit = %unit,
                        attempt = attempt + 1,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "LLM call failed, retrying"
                    );
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Leading whitespace of a completion is dropped before it is written.
fn persist(path: &Path, completion: &str) -> Result<(), DispatchError> {
    write_atomic(path, completion.trim_start())?;
    Ok(())
}
