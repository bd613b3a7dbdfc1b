//! Agent loop configuration

use serde::{Deserialize, Serialize};

use crate::llm::GenerationSettings;

/// Default cap on model calls per turn
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// What the loop does after the approval gate rejects a call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Skip the rest of the batch and end the turn without asking the model again
    #[default]
    EndTurn,
    /// Answer the rejected call (and the skipped remainder) with a rejection
    /// result and let the model react
    ReportToModel,
}

/// Configuration for [`Agent`](super::Agent)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum number of model calls in one turn
    pub max_iterations: usize,

    /// Request streamed output and forward text deltas as they arrive
    pub streaming: bool,

    /// Ask the approval gate before running each local tool
    pub require_approval: bool,

    /// Compact oversized history before the turn starts
    pub compaction: bool,

    pub rejection_policy: RejectionPolicy,

    /// System prompt placed in front of every request
    pub system_prompt: Option<String>,

    /// Settings passed with every generation request
    pub settings: GenerationSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            streaming: true,
            require_approval: true,
            compaction: true,
            rejection_policy: RejectionPolicy::default(),
            system_prompt: None,
            settings: GenerationSettings::default(),
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_approval(mut self, require_approval: bool) -> Self {
        self.require_approval = require_approval;
        self
    }

    pub fn with_compaction(mut self, compaction: bool) -> Self {
        self.compaction = compaction;
        self
    }

    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert!(config.streaming);
        assert!(config.require_approval);
        assert!(config.compaction);
        assert_eq!(config.rejection_policy, RejectionPolicy::EndTurn);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AgentConfig = serde_json::from_value(serde_json::json!({
            "max_iterations": 3,
            "rejection_policy": "report_to_model",
            "settings": {"temperature": 0.2}
        }))
        .unwrap();

        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.rejection_policy, RejectionPolicy::ReportToModel);
        assert_eq!(config.settings.temperature, Some(0.2));
        assert!(config.streaming);
    }
}
