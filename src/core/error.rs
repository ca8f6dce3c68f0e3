//! Error types for tree generation

use thiserror::Error;

/// Main error type for the generator
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Offset out of range: {0} not between 0 and 1")]
    OffsetOutOfRange(f32),

    #[error("Only splitting up to 3 branches is supported, got {0} clones")]
    UnsupportedSplit(usize),

    #[error("Invalid parameter `{key}`: {reason}")]
    InvalidParam { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background generation failed: {0}")]
    Join(String),
}
