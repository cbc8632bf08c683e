//! Portray error types

use std::time::Duration;

use uuid::Uuid;

/// Portray error types.
///
/// "Not found" is not an error: lookups return `Ok(None)` for keys the
/// remote service confirms do not exist, and that absence is cacheable.
/// Everything classified by [`is_transient()`](Self::is_transient) is
/// never cached.
///
/// The enum is `Clone` so a single shared computation can hand the same
/// failure to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortrayError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Data errors
    #[error("failed to decode response: {0}")]
    Decode(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Dispatch errors
    #[error("world {0} was removed before the task could run")]
    WorldRemoved(Uuid),

    #[error("worker pool is shut down")]
    Shutdown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PortrayError {
    /// Whether this failure is temporary: a later, caller-initiated fetch
    /// may succeed. Caches never store transient failures.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortrayError::Http(_)
                | PortrayError::Timeout(_)
                | PortrayError::Api { .. }
                | PortrayError::Decode(_)
        )
    }

    /// Map a transport error, keeping timeouts distinguishable.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            PortrayError::Timeout(timeout)
        } else if err.is_decode() {
            PortrayError::Decode(err.to_string())
        } else {
            PortrayError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PortrayError {
    fn from(err: serde_json::Error) -> Self {
        PortrayError::Decode(err.to_string())
    }
}

/// Result type alias for Portray operations
pub type Result<T> = std::result::Result<T, PortrayError>;
