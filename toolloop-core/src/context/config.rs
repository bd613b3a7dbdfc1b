//! Context compaction configuration

use serde::{Deserialize, Serialize};

use super::estimator::DEFAULT_THRESHOLD;

/// Configuration for context compaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Model context window, in tokens
    pub context_window: usize,

    /// Fraction of the window at which to compact (e.g., 0.8 = 80%)
    pub threshold: f64,

    /// Token budget for the generated summary
    pub summary_max_tokens: usize,

    /// Temperature used when summarizing
    pub summary_temperature: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            context_window: 128_000,
            threshold: DEFAULT_THRESHOLD,
            summary_max_tokens: 500,
            summary_temperature: 0.3,
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = tokens;
        self
    }

    /// Set the compaction threshold, clamped to (0, 1]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.01, 1.0);
        self
    }

    pub fn with_summary_max_tokens(mut self, tokens: usize) -> Self {
        self.summary_max_tokens = tokens;
        self
    }

    /// Token count above which compaction is triggered
    pub fn compaction_threshold(&self) -> usize {
        ((self.context_window as f64) * self.threshold) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContextConfig::default();
        assert_eq!(config.context_window, 128_000);
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.summary_temperature, 0.3);
    }

    #[test]
    fn test_threshold_clamping() {
        assert_eq!(ContextConfig::new().with_threshold(2.0).threshold, 1.0);
        assert_eq!(ContextConfig::new().with_threshold(-0.5).threshold, 0.01);
    }

    #[test]
    fn test_compaction_threshold() {
        let config = ContextConfig::new()
            .with_context_window(10_000)
            .with_threshold(0.8);
        assert_eq!(config.compaction_threshold(), 8000);
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: ContextConfig =
            serde_json::from_value(serde_json::json!({"context_window": 4096})).unwrap();
        assert_eq!(config.context_window, 4096);
        assert_eq!(config.threshold, 0.8);
    }
}
