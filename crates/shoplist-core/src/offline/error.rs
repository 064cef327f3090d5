use thiserror::Error;

use super::WorkerState;

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// A live fetch that produced no response at all.
///
/// HTTP error statuses are not fetch errors: they come back as a
/// `CapturedResponse` and the caching policy decides what to do with them.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Offline: {0}")]
    Offline(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Invalid cache name: {0:?}")]
    InvalidName(String),

    #[error("Cache store not open: {0}")]
    NotOpen(String),
}

/// Returned by `WorkerHost` implementations that cannot reach their clients.
/// The in-process `ClientRegistry` never fails.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to claim clients: {0}")]
    ClaimFailed(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: WorkerState,
    },
}
