//! Boundary and programmatic errors.
//!
//! Document content never produces an error: malformed constructs degrade to
//! literal text. The errors here describe misuse of the session boundary and
//! internal failures that must be reported instead of corrupting other
//! sessions.

use thiserror::Error;

/// Errors reported by the session boundary and serializers.
#[derive(Debug, Error)]
pub enum Error {
    /// The handle was never issued or has already been closed.
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    /// An internal invariant was violated (for example a panic caught while
    /// parsing). The message is the panic payload when one is available.
    #[error("internal error: {0}")]
    Internal(String),
    /// Serializing the document failed.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Create an internal error from a caught panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic during parse".to_string()
        };
        Error::Internal(message)
    }
}

/// Result alias used across the crate's fallible APIs.
pub type Result<T> = std::result::Result<T, Error>;
