//! Error types for intellicenter-state

use thiserror::Error;

/// Result type for intellicenter-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while persisting state
///
/// Decoding notifications never fails; only the side file can.
#[derive(Debug, Error)]
pub enum StateError {
    /// Reading or writing the side file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The side file holds something other than the expected JSON
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StateError {
    fn from(error: serde_json::Error) -> Self {
        StateError::Serialization(error.to_string())
    }
}
