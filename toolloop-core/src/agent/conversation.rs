//! Conversation state owned by one agent run

use crate::llm::{check_tool_pairing, Message, PairingViolation, Role, ToolResultPart};

/// The ordered message sequence of one run.
///
/// Built from the caller's history plus the new user message, mutated only by
/// the loop, and handed back without the system message when the run ends.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    has_system: bool,
}

impl Conversation {
    /// Start a conversation.
    ///
    /// System messages inside `history` are dropped; the system prompt is
    /// owned by the loop configuration.
    pub fn new(
        system_prompt: Option<&str>,
        history: Vec<Message>,
        user_message: impl Into<String>,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        let has_system = match system_prompt {
            Some(prompt) if !prompt.is_empty() => {
                messages.push(Message::system(prompt));
                true
            }
            _ => false,
        };
        messages.extend(history.into_iter().filter(|m| m.role != Role::System));
        messages.push(Message::user(user_message));

        Self {
            messages,
            has_system,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_tool_result(&mut self, result: ToolResultPart) {
        self.messages.push(Message::tool_result(result));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether a tool result for `tool_call_id` is already present
    pub fn has_result_for(&self, tool_call_id: &str) -> bool {
        self.messages
            .iter()
            .flat_map(|m| m.tool_results())
            .any(|r| r.tool_call_id == tool_call_id)
    }

    pub fn check_pairing(&self) -> Result<(), PairingViolation> {
        check_tool_pairing(&self.messages)
    }

    /// Hand the messages back to the caller, minus the system message
    pub fn into_history(self) -> Vec<Message> {
        let skip = usize::from(self.has_system);
        self.messages.into_iter().skip(skip).collect()
    }
}
