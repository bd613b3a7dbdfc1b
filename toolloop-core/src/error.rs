//! Error types for toolloop operations

use crate::tools::RegistryError;

/// Result type for toolloop operations
pub type Result<T> = std::result::Result<T, ToolloopError>;

/// Error types for the toolloop crate
#[derive(Debug, thiserror::Error)]
pub enum ToolloopError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The generation service failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// The generation service finished without producing any output
    #[error("No output generated: {0}")]
    NoOutputGenerated(String),

    /// Context compaction failed
    #[error("Compaction error: {0}")]
    Compaction(String),

    /// Tool registration failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Evaluation fixture or run failed
    #[error("Evaluation error: {0}")]
    Eval(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ToolloopError {
    /// Whether this error means the provider produced nothing at all
    pub fn is_no_output(&self) -> bool {
        matches!(self, ToolloopError::NoOutputGenerated(_))
    }
}

impl From<String> for ToolloopError {
    fn from(s: String) -> Self {
        ToolloopError::Other(s)
    }
}

impl From<&str> for ToolloopError {
    fn from(s: &str) -> Self {
        ToolloopError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ToolloopError {
    fn from(err: anyhow::Error) -> Self {
        ToolloopError::Other(err.to_string())
    }
}
