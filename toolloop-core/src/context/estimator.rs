//! Token estimation
//!
//! A rough character-based estimate; exact tokenization belongs to the
//! generation service.

use serde::{Deserialize, Serialize};

use crate::llm::{Message, Role};

/// Default fraction of the context window that triggers compaction
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Approximate characters per token
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimated token usage of a message sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEstimate {
    /// Everything the model reads (system, user and tool messages)
    pub input: usize,
    /// Everything the model wrote (assistant messages)
    pub output: usize,
    pub total: usize,
}

/// Estimated tokens for a piece of text
pub fn estimate_text_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate the token usage of `messages`.
///
/// Deterministic and pure: the same messages always give the same estimate.
pub fn estimate_tokens(messages: &[Message]) -> TokenEstimate {
    let mut estimate = TokenEstimate::default();
    for message in messages {
        let tokens = estimate_text_tokens(&message.content.render());
        match message.role {
            Role::Assistant => estimate.output += tokens,
            Role::System | Role::User | Role::Tool => estimate.input += tokens,
        }
    }
    estimate.total = estimate.input + estimate.output;
    estimate
}

/// Whether `total` tokens exceed `threshold` of a `window`-token context
pub fn is_over_threshold(total: usize, window: usize, threshold: f64) -> bool {
    (total as f64) > (window as f64) * threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ToolCallRequest, ToolResultPart};
    use serde_json::json;

    #[test]
    fn test_estimate_splits_input_and_output() {
        let messages = vec![
            Message::system("12345678"),
            Message::user("1234"),
            Message::assistant("123456789012"),
        ];

        let estimate = estimate_tokens(&messages);

        assert_eq!(estimate.input, 3);
        assert_eq!(estimate.output, 3);
        assert_eq!(estimate.total, 6);
    }

    #[test]
    fn test_estimate_counts_tool_parts() {
        let call = ToolCallRequest::new("c1", "read_file", json!({"path": "a.txt"}));
        let messages = vec![
            Message::assistant_with_tool_calls("", &[call]),
            Message::tool_result(ToolResultPart {
                tool_call_id: "c1".to_string(),
                tool_name: "read_file".to_string(),
                output: "x".repeat(400),
                is_error: false,
            }),
        ];

        let estimate = estimate_tokens(&messages);

        assert!(estimate.output > 0);
        assert!(estimate.input >= 100);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let messages = vec![Message::user("the same input every time")];
        assert_eq!(estimate_tokens(&messages), estimate_tokens(&messages));
        assert_eq!(estimate_tokens(&[]), TokenEstimate::default());
    }

    #[test]
    fn test_is_over_threshold() {
        assert!(!is_over_threshold(800, 1000, DEFAULT_THRESHOLD));
        assert!(is_over_threshold(801, 1000, DEFAULT_THRESHOLD));
        assert!(is_over_threshold(600, 1000, 0.5));
    }
}
