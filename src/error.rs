//! Error types
//!
//! Two families of failure exist. Configuration errors are raised once, when a
//! model is constructed, before any forward pass can run. Shape and range errors
//! are raised per call and abort that call without producing partial output.

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building or running a transformer
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Construction parameters are inconsistent
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration
        reason: String,
    },

    /// A token id does not index into its embedding table
    #[error("token id {token} out of range (vocab_size = {vocab_size})")]
    TokenOutOfRange { token: usize, vocab_size: usize },

    /// A sequence is longer than the position table
    #[error("sequence length {len} exceeds max_length {max_length}")]
    SequenceTooLong { len: usize, max_length: usize },

    /// Rows of a token batch have different lengths
    #[error("ragged batch: row {row} has length {got}, expected {expected}")]
    RaggedBatch {
        row: usize,
        expected: usize,
        got: usize,
    },

    /// Two inputs disagree on the batch dimension
    #[error("batch size mismatch: expected {expected}, got {got}")]
    BatchMismatch { expected: usize, got: usize },

    /// A tensor does not have the shape an operation requires
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// A mask cannot be broadcast onto the attention scores
    #[error("mask of shape {mask:?} cannot broadcast to {target:?}")]
    MaskShape {
        mask: Vec<usize>,
        target: Vec<usize>,
    },

    /// Malformed JSON configuration
    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reading a configuration file
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }
}
