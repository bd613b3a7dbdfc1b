//! Loop states and run outcome

use serde::{Deserialize, Serialize};

use crate::llm::{Message, TokenUsage, ToolCallRequest};

/// Surfaced when a turn hits the iteration cap
pub const TRUNCATION_NOTICE: &str =
    "[Stopped after reaching the step limit for this turn. Ask me to continue if there is more to do.]";

/// Shown in place of a response when generation fails before producing text
pub const FALLBACK_MESSAGE: &str = "Sorry, I couldn't generate a response. Please try again.";

/// Result text for a call the approval gate rejected
pub const REJECTED_RESULT: &str = "Tool call rejected by the user.";

/// Result text for calls skipped after an earlier rejection in the same batch
pub const SKIPPED_RESULT: &str =
    "Tool call not executed because an earlier call in the same batch was rejected.";

/// Result text for a provider tool whose result never arrived
pub const MISSING_PROVIDER_RESULT: &str = "The provider did not return a result for this tool.";

/// Agent loop state
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    /// About to ask the model
    AwaitingModel,
    /// Working through the batch of calls the model just proposed
    ProcessingTools(Vec<ToolCallRequest>),
    /// Terminal
    Done(StopReason),
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished without requesting tools
    Completed,
    /// The approval gate rejected a call and the turn ended
    Rejected { tool_name: String },
    /// The iteration cap was reached
    IterationLimit,
    /// Generation failed before producing any text
    GenerationFailed { message: String },
    /// The run's cancellation token fired
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::Rejected { .. } => "rejected",
            StopReason::IterationLimit => "iteration_limit",
            StopReason::GenerationFailed { .. } => "generation_failed",
            StopReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a caller gets back from one run
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final assistant text (or the fallback message)
    pub text: String,
    /// Updated history without the system message; the caller persists it
    pub history: Vec<Message>,
    pub stop_reason: StopReason,
    /// Number of model calls made
    pub iterations: usize,
    /// Number of local tool executions
    pub tool_executions: usize,
    /// Usage summed over all model calls that reported it
    pub usage: TokenUsage,
    /// User-facing notice (truncation, rejection, cancellation)
    pub notice: Option<String>,
    /// Whether history was compacted before the turn
    pub compacted: bool,
}

impl AgentOutcome {
    pub fn is_completed(&self) -> bool {
        self.stop_reason == StopReason::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_serialization() {
        let json = serde_json::to_value(StopReason::Rejected {
            tool_name: "delete_file".to_string(),
        })
        .unwrap();
        assert_eq!(json["reason"], "rejected");
        assert_eq!(json["tool_name"], "delete_file");

        let parsed: StopReason =
            serde_json::from_value(serde_json::json!({"reason": "iteration_limit"})).unwrap();
        assert_eq!(parsed, StopReason::IterationLimit);
        assert_eq!(parsed.to_string(), "iteration_limit");
    }
}
