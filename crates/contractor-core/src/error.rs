//! Error types for Contractor Core

use thiserror::Error;

/// Result type alias using Contractor Error
pub type Result<T> = std::result::Result<T, Error>;

/// Contractor error types
#[derive(Error, Debug)]
pub enum Error {
    /// A model round-trip failed. Fatal for the turn that issued it.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller may resend the same turn.
    ///
    /// Provider failures leave no partial state behind, so the turn can be
    /// replayed as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider(_))
    }
}

/// Tool-specific errors. These never escape a turn; the registry folds
/// them into an error result for the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}
