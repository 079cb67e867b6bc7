//! Batch dispatch of canonical artifacts to an OpenAI-compatible chat endpoint.
//!
//! Each artifact is prefixed with the prompt template of its category and
//! sent with bounded, exponentially backed-off retries. Responses are
//! persisted next to each other per patient; an existing response is never
//! requested again, so an interrupted run can simply be restarted.

pub mod client;
pub mod prompt;
pub mod runner;

pub use client::{ChatCompletionClient, LlmClient};
pub use prompt::PromptCatalog;
pub use runner::{DispatchSummary, Dispatcher, RetryPolicy, Shard};

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Category;
use crate::pipeline::storage::StorageError;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Cannot reach LLM endpoint at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("LLM endpoint returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("LLM returned an empty completion")]
    EmptyResponse,

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("No prompt template for category {0}")]
    PromptMissing(Category),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Instance {index} out of range for {count} instances")]
    InvalidShard { index: usize, count: usize },

    #[error("No API key configured for instance {0}")]
    NoApiKey(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Failures worth another attempt: transport problems, throttling and
/// server-side errors. Client errors such as a rejected key are final.
pub fn is_retryable_error(e: &DispatchError) -> bool {
    match e {
        DispatchError::Connection(_)
        | DispatchError::HttpClient(_)
        | DispatchError::EmptyResponse
        | DispatchError::ResponseParsing(_) => true,
        DispatchError::Api { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_server_errors_are_retryable() {
        assert!(is_retryable_error(&DispatchError::Api {
            status: 429,
            body: String::new()
        }));
        assert!(is_retryable_error(&DispatchError::Api {
            status: 503,
            body: String::new()
        }));
        assert!(is_retryable_error(&DispatchError::Connection("x".into())));
    }

    #[test]
    fn client_errors_are_final() {
        assert!(!is_retryable_error(&DispatchError::Api {
            status: 401,
            body: "invalid key".into()
        }));
        assert!(!is_retryable_error(&DispatchError::PromptMissing(Category::Other)));
    }
}
