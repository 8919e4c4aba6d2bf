//! Error types for the tuning engine.

/// Tuner-specific errors.
#[derive(thiserror::Error, Debug)]
pub enum TuneError {
    /// Rejected before the run starts (e.g. a window degenerate to one probe).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Oracle failure: bad reply, broken pipe, out-of-range coefficient index.
    #[error("oracle failure: {0}")]
    Oracle(String),

    /// Worker crash or protocol violation. Not recoverable within a session.
    #[error("worker failure: {0}")]
    Worker(String),

    /// File I/O error (vector persistence)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Vector file serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for tuning operations
pub type TuneResult<T> = Result<T, TuneError>;
