//! Error types for pimgen

use thiserror::Error;

/// pimgen error type
#[derive(Debug, Error)]
pub enum PimError {
    /// Matrix dimensions are zero or too large to address
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Row capacity must be positive
    #[error("Invalid row capacity: {0} (must be > 0)")]
    InvalidRowCapacity(u64),

    /// Core count must be positive
    #[error("Invalid core count: {0} (must be > 0)")]
    InvalidCoreCount(usize),

    /// Text that is not a 24-bit instruction word
    #[error("Malformed instruction word {word:?}: {reason}")]
    MalformedWord { word: String, reason: String },

    /// Listing line that is neither an annotation nor an instruction word
    #[error("Listing error at line {line}: {message}")]
    Listing { line: usize, message: String },

    /// Dimension contract error
    #[error("Dimension contract error: {0}")]
    Contract(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PimError {
    pub(crate) fn malformed(word: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedWord {
            word: word.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PimError>;
