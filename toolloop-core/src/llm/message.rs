//! Conversation message model
//!
//! Messages form an append-only ordered sequence. Content is either plain
//! text or a list of structured parts (text, tool-call requests, tool results).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier unique within the turn
    pub id: String,
    /// Name of the requested tool
    pub name: String,
    /// Arguments, already validated against the tool schema by the provider
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Result of a tool call, as seen by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPart {
    /// Back-reference to the originating [`ToolCallRequest::id`]
    pub tool_call_id: String,
    /// Name of the tool that produced the result
    pub tool_name: String,
    /// Textual result (success output or error text)
    pub output: String,
    /// Whether the output describes a failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// One structured part of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall(ToolCallRequest),
    ToolResult(ToolResultPart),
}

/// Message content: plain text or structured parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Concatenated text of all text parts
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Flattened textual rendering used for summaries and token estimates
    pub fn render(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.clone(),
                    ContentPart::ToolCall(call) => {
                        format!("[tool call {}({})]", call.name, call.arguments)
                    }
                    ContentPart::ToolResult(result) => {
                        format!("[tool result {}: {}]", result.tool_name, result.output)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        }
    }

    /// Assistant message carrying optional text followed by tool-call requests
    pub fn assistant_with_tool_calls(text: &str, calls: &[ToolCallRequest]) -> Self {
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            parts.push(ContentPart::Text {
                text: text.to_string(),
            });
        }
        parts.extend(calls.iter().cloned().map(ContentPart::ToolCall));
        Self {
            role: Role::Assistant,
            content: Content::Parts(parts),
        }
    }

    /// Tool message carrying a single result
    pub fn tool_result(result: ToolResultPart) -> Self {
        Self {
            role: Role::Tool,
            content: Content::Parts(vec![ContentPart::ToolResult(result)]),
        }
    }

    /// Plain text of this message (tool parts excluded)
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Tool-call requests contained in this message
    pub fn tool_calls(&self) -> Vec<&ToolCallRequest> {
        match &self.content {
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolCall(call) => Some(call),
                    _ => None,
                })
                .collect(),
            Content::Text(_) => Vec::new(),
        }
    }

    /// Tool results contained in this message
    pub fn tool_results(&self) -> Vec<&ToolResultPart> {
        match &self.content {
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolResult(result) => Some(result),
                    _ => None,
                })
                .collect(),
            Content::Text(_) => Vec::new(),
        }
    }
}

/// Violation of the tool-call/tool-result pairing rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairingViolation {
    #[error("tool result at message {index} references unknown call id '{tool_call_id}'")]
    OrphanResult { index: usize, tool_call_id: String },

    #[error("tool call id '{tool_call_id}' has more than one result (message {index})")]
    DuplicateResult { index: usize, tool_call_id: String },

    #[error("tool call id '{tool_call_id}' is requested twice (message {index})")]
    DuplicateCall { index: usize, tool_call_id: String },
}

/// Check that every tool result references exactly one preceding tool call
/// and that no call receives more than one result.
pub fn check_tool_pairing(messages: &[Message]) -> Result<(), PairingViolation> {
    let mut calls = HashSet::new();
    let mut answered = HashSet::new();

    for (index, message) in messages.iter().enumerate() {
        for call in message.tool_calls() {
            if !calls.insert(call.id.clone()) {
                return Err(PairingViolation::DuplicateCall {
                    index,
                    tool_call_id: call.id.clone(),
                });
            }
        }
        for result in message.tool_results() {
            if !calls.contains(&result.tool_call_id) {
                return Err(PairingViolation::OrphanResult {
                    index,
                    tool_call_id: result.tool_call_id.clone(),
                });
            }
            if !answered.insert(result.tool_call_id.clone()) {
                return Err(PairingViolation::DuplicateResult {
                    index,
                    tool_call_id: result.tool_call_id.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(id: &str) -> Message {
        Message::tool_result(ToolResultPart {
            tool_call_id: id.to_string(),
            tool_name: "echo".to_string(),
            output: "ok".to_string(),
            is_error: false,
        })
    }

    #[test]
    fn test_pairing_accepts_matched_results() {
        let call = ToolCallRequest::new("call_1", "echo", json!({}));
        let messages = vec![
            Message::user("hi"),
            Message::assistant_with_tool_calls("", &[call]),
            result("call_1"),
        ];
        assert!(check_tool_pairing(&messages).is_ok());
    }

    #[test]
    fn test_pairing_rejects_orphan_result() {
        let messages = vec![Message::user("hi"), result("call_9")];
        assert!(matches!(
            check_tool_pairing(&messages),
            Err(PairingViolation::OrphanResult { index: 1, .. })
        ));
    }

    #[test]
    fn test_pairing_rejects_duplicate_result() {
        let call = ToolCallRequest::new("call_1", "echo", json!({}));
        let messages = vec![
            Message::assistant_with_tool_calls("", &[call]),
            result("call_1"),
            result("call_1"),
        ];
        assert!(matches!(
            check_tool_pairing(&messages),
            Err(PairingViolation::DuplicateResult { .. })
        ));
    }

    #[test]
    fn test_content_text_skips_tool_parts() {
        let call = ToolCallRequest::new("c", "list_files", json!({"path": "/tmp"}));
        let message = Message::assistant_with_tool_calls("Looking", &[call]);
        assert_eq!(message.text(), "Looking");
        assert_eq!(message.tool_calls().len(), 1);
        assert!(message.content.render().contains("list_files"));
    }

    #[test]
    fn test_message_serialization_shape() {
        let json = serde_json::to_value(Message::user("hello")).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "hello"}));
    }
}
