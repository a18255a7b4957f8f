//! Error types for the strata library.

use thiserror::Error;

/// Main error type for strata operations.
///
/// Cyclic sub-layer chains and broken arc targets are not represented here:
/// composition degrades them to per-branch warnings (see
/// [`crate::compose::ComposeWarning`]). Only failures that abort an entire
/// operation surface as `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested layer does not exist in the layer source.
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// Layer document exists but could not be parsed.
    #[error("Malformed layer document {path}: {detail}")]
    MalformedLayer { path: String, detail: String },

    /// I/O error while reading a layer document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a malformed-layer error.
    pub fn malformed(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedLayer {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// Result type alias for strata operations.
pub type Result<T> = std::result::Result<T, Error>;
