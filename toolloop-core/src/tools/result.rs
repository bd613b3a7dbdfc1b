//! Tool outcomes and errors
//!
//! Outcomes are tagged internally and flattened to plain text at the model
//! boundary, where failures carry a distinct prefix.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text shown to the model in place of a provider tool's local result
pub const PROVIDER_EXECUTED_MARKER: &str = "[executed by provider]";

/// Result of running a local tool handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok(String),
    Err(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Err(_))
    }

    /// Raw text without any prefix
    pub fn text(&self) -> &str {
        match self {
            ToolOutcome::Ok(text) | ToolOutcome::Err(text) => text,
        }
    }

    /// Text as seen by the model
    pub fn to_model_text(&self, tool_name: &str) -> String {
        match self {
            ToolOutcome::Ok(text) => text.clone(),
            ToolOutcome::Err(message) => format!("Error executing {}: {}", tool_name, message),
        }
    }
}

impl From<Result<String, ToolError>> for ToolOutcome {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(text) => ToolOutcome::Ok(text),
            Err(error) => ToolOutcome::Err(error.message),
        }
    }
}

impl From<ToolError> for ToolOutcome {
    fn from(error: ToolError) -> Self {
        ToolOutcome::Err(error.message)
    }
}

/// What the executor did with a tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolExecution {
    /// A local handler ran (successfully or not)
    Completed(ToolOutcome),
    /// The tool runs inside the generation service; no local result exists
    ProviderExecuted,
    /// No tool with this name is registered
    UnknownTool(String),
}

impl ToolExecution {
    /// Whether the model should read this as a failure
    pub fn is_error(&self) -> bool {
        match self {
            ToolExecution::Completed(outcome) => outcome.is_error(),
            ToolExecution::ProviderExecuted => false,
            ToolExecution::UnknownTool(_) => true,
        }
    }

    /// Text as seen by the model
    pub fn to_model_text(&self, tool_name: &str) -> String {
        match self {
            ToolExecution::Completed(outcome) => outcome.to_model_text(tool_name),
            ToolExecution::ProviderExecuted => PROVIDER_EXECUTED_MARKER.to_string(),
            ToolExecution::UnknownTool(name) => format!("Unknown tool: {}", name),
        }
    }
}

/// Error kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments do not match the tool's input contract
    InvalidArguments,

    /// The handler itself failed
    Execution,

    /// Execution timed out
    Timeout,

    /// Cancelled by the caller
    Cancelled,
}

/// Tool handler failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Execution, message)
    }

    pub fn timeout(duration: Duration) -> Self {
        Self::new(
            ToolErrorKind::Timeout,
            format!("timed out after {}", humantime_serde::re::humantime::format_duration(duration)),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ToolErrorKind::Cancelled, "cancelled")
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::execution(err.to_string())
    }
}

#[cfg(test)]
mod result_tests {
    use super::*;

    #[test]
    fn test_error_outcome_is_prefixed() {
        let outcome = ToolOutcome::from(Err(ToolError::execution("disk full")));
        assert!(outcome.is_error());
        assert_eq!(
            outcome.to_model_text("write_file"),
            "Error executing write_file: disk full"
        );
    }

    #[test]
    fn test_success_outcome_is_verbatim() {
        let outcome = ToolOutcome::Ok("[file] b.txt".to_string());
        assert_eq!(outcome.to_model_text("list_files"), "[file] b.txt");
    }

    #[test]
    fn test_unknown_tool_text() {
        let execution = ToolExecution::UnknownTool("frobnicate".to_string());
        assert!(execution.is_error());
        assert_eq!(execution.to_model_text("frobnicate"), "Unknown tool: frobnicate");
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(ToolOutcome::Err("boom".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "err", "text": "boom"}));
    }

    #[test]
    fn test_timeout_message() {
        let err = ToolError::timeout(Duration::from_secs(2));
        assert_eq!(err.kind, ToolErrorKind::Timeout);
        assert_eq!(err.message, "timed out after 2s");
    }
}
