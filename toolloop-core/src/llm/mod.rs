//! Generation capability
//!
//! The [`LLMProvider`] trait is the seam between the agent loop and a
//! text-generation service. A provider accepts the conversation, the tool
//! definitions and the generation settings, and answers either with a whole
//! [`GenerationResponse`] or with a stream of [`StreamEvent`]s.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

use crate::error::Result;

mod message;

pub mod factory;
pub mod providers;
pub mod scripted;

pub use factory::LLMProviderFactory;
pub use message::{
    check_tool_pairing, Content, ContentPart, Message, PairingViolation, Role, ToolCallRequest,
    ToolResultPart,
};
pub use scripted::{scripted_call, ScriptedProvider, ScriptedTurn};

/// Why the provider stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
}

/// Reasoning effort hint for models that support it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// Per-request generation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Model identifier; the provider default is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Temperature for generation (0.0-2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Reasoning effort hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl GenerationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Tool definition as sent to the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments
    pub parameters: Value,
    /// Executed inside the provider rather than locally
    #[serde(default)]
    pub provider_executed: bool,
}

/// Request to a provider
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
}

impl GenerationRequest {
    /// Request without tools
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Accumulate another usage report into this one
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Complete response from a provider
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,
    /// Tool calls requested by the model, in the order produced
    pub tool_calls: Vec<ToolCallRequest>,
    /// Results of provider-executed tools, delivered inline
    pub provider_results: Vec<ToolResultPart>,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

impl GenerationResponse {
    /// A plain text response that finished naturally
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            provider_results: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    /// A response requesting tool calls
    pub fn tool_calls(text: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: text.into(),
            tool_calls: calls,
            provider_results: Vec::new(),
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_provider_result(mut self, result: ToolResultPart) -> Self {
        self.provider_results.push(result);
        self
    }

    /// Replay this response as the event sequence a streaming provider would emit
    pub fn into_events(self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.text.is_empty() {
            events.push(StreamEvent::TextDelta(self.text));
        }
        events.extend(self.tool_calls.into_iter().map(StreamEvent::ToolCall));
        events.extend(
            self.provider_results
                .into_iter()
                .map(StreamEvent::ProviderToolResult),
        );
        events.push(StreamEvent::Finish {
            reason: self.finish_reason,
            usage: self.usage,
        });
        events
    }
}

/// Incremental output of a streaming provider
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Partial text
    TextDelta(String),
    /// A complete tool-call request
    ToolCall(ToolCallRequest),
    /// Result of a provider-executed tool
    ProviderToolResult(ToolResultPart),
    /// End of generation
    Finish {
        reason: FinishReason,
        usage: Option<TokenUsage>,
    },
}

/// Boxed stream of provider events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Trait for generation service implementations.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a complete response.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Generate with a streaming response.
    ///
    /// The default implementation replays [`LLMProvider::generate`] as a
    /// single burst of events.
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream> {
        let response = self.generate(request).await?;
        let events = response.into_events().into_iter().map(Ok);
        Ok(Box::pin(futures::stream::iter(events)))
    }

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Ask the provider for a one-off completion of `prompt` and return its text.
pub async fn complete_text(
    provider: &dyn LLMProvider,
    prompt: impl Into<String>,
    settings: GenerationSettings,
) -> Result<String> {
    let request = GenerationRequest::new(vec![Message::user(prompt)]).with_settings(settings);
    let response = provider.generate(&request).await?;
    Ok(response.text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_settings_builder() {
        let settings = GenerationSettings::new()
            .with_model("gpt-4o-mini")
            .with_temperature(5.0)
            .with_reasoning_effort(ReasoningEffort::Low)
            .with_max_tokens(256);

        assert_eq!(settings.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(settings.temperature, Some(2.0));
        assert_eq!(settings.max_tokens, Some(256));
    }

    #[test]
    fn test_finish_reason_serialization() {
        let json = serde_json::to_string(&FinishReason::ToolCalls).unwrap();
        assert_eq!(json, "\"tool-calls\"");
        let parsed: FinishReason = serde_json::from_str("\"content-filter\"").unwrap();
        assert_eq!(parsed, FinishReason::ContentFilter);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage::new(10, 5));
        total.add(&TokenUsage::new(3, 2));
        assert_eq!(total.total_tokens, 20);
    }

    struct FixedProvider;

    #[async_trait]
    impl LLMProvider for FixedProvider {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
            Ok(GenerationResponse::tool_calls(
                "checking",
                vec![ToolCallRequest::new("c1", "list_files", json!({"path": "/tmp"}))],
            ))
        }
    }

    #[tokio::test]
    async fn test_default_stream_replays_response() {
        let request = GenerationRequest::new(vec![Message::user("hi")]);
        let events: Vec<_> = FixedProvider
            .generate_stream(&request)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(StreamEvent::TextDelta(ref t)) if t == "checking"));
        assert!(matches!(events[1], Ok(StreamEvent::ToolCall(_))));
        assert!(matches!(
            events[2],
            Ok(StreamEvent::Finish {
                reason: FinishReason::ToolCalls,
                ..
            })
        ));
    }
}
