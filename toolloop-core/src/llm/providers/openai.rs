//! OpenAI chat-completions provider with function calling

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::error::{Result, ToolloopError};
use crate::llm::{
    EventStream, FinishReason, GenerationRequest, GenerationResponse, LLMProvider,
    Message, ModelInfo, Role, StreamEvent, TokenUsage, ToolCallRequest, ToolDefinition,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI provider (GPT-4o and compatible chat-completions APIs).
///
/// Provider-executed tools are not sent: chat completions cannot run them,
/// so registering one with this provider only yields a missing-result error.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `model` - Default model name (e.g., "gpt-4o"); requests may override it
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create with a custom base URL (for Azure OpenAI or compatible APIs).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables.
    ///
    /// Reads `OPENAI_API_KEY` (required), `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    /// An explicit `model` takes precedence over `OPENAI_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns an error if OPENAI_API_KEY is not set.
    pub fn from_env(model: Option<impl Into<String>>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ToolloopError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let model = model
            .map(|m| m.into())
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::with_base_url(api_key, model, base_url))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, request: &GenerationRequest, stream: bool) -> OpenAIRequest {
        let settings = &request.settings;
        OpenAIRequest {
            model: settings.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: convert_messages(&request.messages),
            tools: convert_tools(&request.tools),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            reasoning_effort: settings.reasoning_effort.map(|e| e.as_str().to_string()),
            stream,
            stream_options: stream.then(|| json!({ "include_usage": true })),
        }
    }

    async fn send(&self, body: &OpenAIRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ToolloopError::Generation(format!("Failed to send request to OpenAI: {}", e))
            })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if let Ok(error) = serde_json::from_str::<OpenAIError>(&text) {
            return Err(ToolloopError::Generation(format!(
                "OpenAI API error ({}): {}",
                error.error.error_type.unwrap_or_else(|| status.to_string()),
                error.error.message
            )));
        }

        Err(ToolloopError::Generation(format!(
            "OpenAI API error ({}): {}",
            status, text
        )))
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<Value>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIMessageResponse>,
    delta: Option<OpenAIDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Deserialize)]
struct OpenAIFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAIToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Deserialize)]
struct OpenAIFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

impl From<OpenAIUsage> for TokenUsage {
    fn from(u: OpenAIUsage) -> Self {
        TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

fn parse_arguments(name: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(tool = %name, error = %e, "Tool arguments are not valid JSON");
        Value::String(raw.to_string())
    })
}

/// Convert the conversation into the chat-completions wire format.
///
/// Tool calls without a result anywhere in the history are left out, since
/// the API rejects an assistant tool call that is not answered.
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    let answered: HashSet<&str> = messages
        .iter()
        .flat_map(|m| m.tool_results())
        .map(|r| r.tool_call_id.as_str())
        .collect();

    let mut wire = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::Tool => {
                for result in message.tool_results() {
                    wire.push(json!({
                        "role": "tool",
                        "tool_call_id": result.tool_call_id,
                        "content": result.output,
                    }));
                }
            }
            Role::Assistant => {
                let calls: Vec<Value> = message
                    .tool_calls()
                    .into_iter()
                    .filter(|call| {
                        let keep = answered.contains(call.id.as_str());
                        if !keep {
                            debug!(tool_call_id = %call.id, "Dropping unanswered tool call from request");
                        }
                        keep
                    })
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            },
                        })
                    })
                    .collect();

                let text = message.text();
                if calls.is_empty() {
                    if !text.is_empty() {
                        wire.push(json!({ "role": "assistant", "content": text }));
                    }
                } else {
                    wire.push(json!({
                        "role": "assistant",
                        "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                        "tool_calls": calls,
                    }));
                }
            }
            role => {
                wire.push(json!({ "role": role.as_str(), "content": message.content.render() }));
            }
        }
    }
    wire
}

/// Function definitions for the request.
///
/// Chat completions has no provider-executed tools, so those are left out.
fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| {
            if tool.provider_executed {
                warn!(tool = %tool.name, "Provider tools are not supported by chat completions, skipping");
                return None;
            }
            Some(json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                },
            }))
        })
        .collect()
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Turns streamed chunks into [`StreamEvent`]s.
///
/// Tool-call fragments are buffered per index and released as whole calls
/// once the provider reports a finish reason.
#[derive(Default)]
struct ChunkAssembler {
    partial_calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<TokenUsage>,
    produced_output: bool,
    finished: bool,
}

impl ChunkAssembler {
    fn push(&mut self, chunk: OpenAIStreamChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        for choice in chunk.choices {
            if let Some(delta) = choice.delta {
                if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                    self.produced_output = true;
                    events.push(StreamEvent::TextDelta(content));
                }
                for fragment in delta.tool_calls.unwrap_or_default() {
                    let entry = self.partial_calls.entry(fragment.index).or_default();
                    if let Some(id) = fragment.id {
                        entry.id = id;
                    }
                    if let Some(function) = fragment.function {
                        if let Some(name) = function.name {
                            entry.name.push_str(&name);
                        }
                        if let Some(arguments) = function.arguments {
                            entry.arguments.push_str(&arguments);
                        }
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(parse_finish_reason(&reason));
                events.extend(self.drain_calls());
            }
        }

        events
    }

    fn drain_calls(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.partial_calls)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                self.produced_output = true;
                let arguments = parse_arguments(&call.name, &call.arguments);
                StreamEvent::ToolCall(ToolCallRequest::new(call.id, call.name, arguments))
            })
            .collect()
    }

    /// Close the stream, emitting the final event.
    fn finish(&mut self) -> Vec<Result<StreamEvent>> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events: Vec<Result<StreamEvent>> = self.drain_calls().into_iter().map(Ok).collect();

        match self.finish_reason {
            Some(reason) => events.push(Ok(StreamEvent::Finish {
                reason,
                usage: self.usage,
            })),
            None if !self.produced_output => events.push(Err(ToolloopError::NoOutputGenerated(
                "OpenAI stream ended without output".to_string(),
            ))),
            None => events.push(Ok(StreamEvent::Finish {
                reason: FinishReason::Stop,
                usage: self.usage,
            })),
        }
        events
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let body = self.build_request(request, false);
        let response = self.send(&body).await?;

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            ToolloopError::Generation(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            ToolloopError::NoOutputGenerated("OpenAI API returned no choices".to_string())
        })?;

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(parse_finish_reason)
            .unwrap_or(FinishReason::Stop);

        let (text, tool_calls) = match choice.message {
            Some(message) => {
                let calls = message
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|call| {
                        let arguments = parse_arguments(&call.function.name, &call.function.arguments);
                        ToolCallRequest::new(call.id, call.function.name, arguments)
                    })
                    .collect();
                (message.content.unwrap_or_default(), calls)
            }
            None => (String::new(), Vec::new()),
        };

        Ok(GenerationResponse {
            text,
            tool_calls,
            provider_results: Vec::new(),
            finish_reason,
            usage: openai_response.usage.map(Into::into),
        })
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream> {
        let body = self.build_request(request, true);
        let response = self.send(&body).await?;

        // Convert response bytes to a stream of lines
        let bytes_stream = response.bytes_stream();
        let reader = tokio_util::io::StreamReader::new(
            bytes_stream.map(|r| r.map_err(std::io::Error::other)),
        );
        let lines = Box::pin(LinesStream::new(tokio::io::BufReader::new(reader).lines()));

        let state = (lines, ChunkAssembler::default(), VecDeque::new());
        let stream = futures::stream::unfold(state, |(mut lines, mut assembler, mut pending)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((event, (lines, assembler, pending)));
                }
                if assembler.finished {
                    return None;
                }

                match lines.next().await {
                    Some(Ok(line)) => {
                        // SSE format: "data: {...}"
                        let Some(data) = line.strip_prefix("data: ") else {
                            continue;
                        };
                        if data == "[DONE]" {
                            pending.extend(assembler.finish());
                            continue;
                        }
                        match serde_json::from_str::<OpenAIStreamChunk>(data) {
                            Ok(chunk) => pending.extend(assembler.push(chunk).into_iter().map(Ok)),
                            Err(e) => pending.push_back(Err(ToolloopError::Generation(format!(
                                "Failed to parse stream chunk: {}",
                                e
                            )))),
                        }
                    }
                    Some(Err(e)) => {
                        assembler.finished = true;
                        pending.push_back(Err(ToolloopError::Generation(format!(
                            "Stream read error: {}",
                            e
                        ))));
                    }
                    None => pending.extend(assembler.finish()),
                }
            }
        });

        Ok(Box::pin(stream))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "openai".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Content, ContentPart, ToolResultPart};

    fn chunk(value: Value) -> OpenAIStreamChunk {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAIProvider::new("test-key", "gpt-4o");
        assert_eq!(provider.model(), "gpt-4o");
        assert_eq!(provider.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_openai_provider_custom_base_url() {
        let provider =
            OpenAIProvider::with_base_url("test-key", "gpt-4", "http://localhost:8080/v1/");
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_convert_messages_with_tool_round_trip() {
        let call = ToolCallRequest::new("call_1", "read_file", json!({"path": "a.txt"}));
        let messages = vec![
            Message::system("You are helpful"),
            Message::user("Read a.txt"),
            Message::assistant_with_tool_calls("", &[call]),
            Message::tool_result(ToolResultPart {
                tool_call_id: "call_1".to_string(),
                tool_name: "read_file".to_string(),
                output: "hello".to_string(),
                is_error: false,
            }),
        ];

        let converted = convert_messages(&messages);

        assert_eq!(converted.len(), 4);
        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[2]["tool_calls"][0]["function"]["name"], "read_file");
        assert_eq!(
            converted[2]["tool_calls"][0]["function"]["arguments"],
            "{\"path\":\"a.txt\"}"
        );
        assert!(converted[2]["content"].is_null());
        assert_eq!(converted[3]["role"], "tool");
        assert_eq!(converted[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_convert_messages_drops_unanswered_calls() {
        let call = ToolCallRequest::new("call_1", "delete_file", json!({"path": "a.txt"}));
        let messages = vec![
            Message::user("delete a.txt"),
            Message::assistant_with_tool_calls("Deleting it", &[call]),
        ];

        let converted = convert_messages(&messages);

        assert_eq!(converted.len(), 2);
        assert_eq!(converted[1]["content"], "Deleting it");
        assert!(converted[1].get("tool_calls").is_none());
    }

    #[test]
    fn test_convert_tools() {
        let tools = vec![
            ToolDefinition {
                name: "read_file".to_string(),
                description: "Read a file".to_string(),
                parameters: json!({"type": "object"}),
                provider_executed: false,
            },
            ToolDefinition {
                name: "web_search".to_string(),
                description: "Search the web".to_string(),
                parameters: json!({}),
                provider_executed: true,
            },
        ];

        let converted = convert_tools(&tools);
        assert_eq!(converted[0]["type"], "function");
        assert_eq!(converted[0]["function"]["name"], "read_file");
        assert_eq!(converted.len(), 1);
    }

    #[test]
    fn test_assembler_joins_tool_call_fragments() {
        let mut assembler = ChunkAssembler::default();

        let first = assembler.push(chunk(json!({
            "choices": [{"delta": {"content": "Let me look", "tool_calls": [
                {"index": 0, "id": "call_a", "function": {"name": "list_files", "arguments": "{\"pa"}}
            ]}}]
        })));
        assert_eq!(first, vec![StreamEvent::TextDelta("Let me look".to_string())]);

        let second = assembler.push(chunk(json!({
            "choices": [{"delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "th\":\".\"}"}}
            ]}, "finish_reason": "tool_calls"}]
        })));
        assert_eq!(
            second,
            vec![StreamEvent::ToolCall(ToolCallRequest::new(
                "call_a",
                "list_files",
                json!({"path": "."})
            ))]
        );

        assembler.push(chunk(json!({
            "choices": [],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        })));

        let tail = assembler.finish();
        assert_eq!(tail.len(), 1);
        assert!(matches!(
            tail[0],
            Ok(StreamEvent::Finish {
                reason: FinishReason::ToolCalls,
                usage: Some(TokenUsage { total_tokens: 16, .. })
            })
        ));
        assert!(assembler.finish().is_empty());
    }

    #[test]
    fn test_assembler_reports_empty_stream() {
        let mut assembler = ChunkAssembler::default();
        let tail = assembler.finish();
        assert!(matches!(tail[0], Err(ref e) if e.is_no_output()));
    }

    #[test]
    fn test_parse_arguments_keeps_invalid_json_raw() {
        assert_eq!(parse_arguments("t", ""), json!({}));
        assert_eq!(parse_arguments("t", "{oops"), Value::String("{oops".to_string()));
    }

    #[test]
    fn test_model_info() {
        let provider = OpenAIProvider::new("test-key", "gpt-4o-mini");
        let info = provider.model_info();
        assert_eq!(info.provider, "openai");
        assert_eq!(info.model_name, "gpt-4o-mini");
    }

    #[test]
    fn test_convert_messages_renders_text_parts() {
        let message = Message {
            role: Role::User,
            content: Content::Parts(vec![ContentPart::Text {
                text: "hi".to_string(),
            }]),
        };
        assert_eq!(convert_messages(&[message])[0]["content"], "hi");
    }
}
