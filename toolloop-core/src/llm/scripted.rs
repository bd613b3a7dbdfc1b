//! Scripted provider for deterministic runs
//!
//! Replays a fixed sequence of turns and records every request it receives,
//! so agent behavior can be exercised offline.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::error::{Result, ToolloopError};
use crate::llm::{
    EventStream, GenerationRequest, GenerationResponse, LLMProvider, ModelInfo, StreamEvent,
    ToolCallRequest,
};

/// One scripted provider turn
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Answer with a complete response
    Respond(GenerationResponse),
    /// Stream these events, then fail with the given message if present
    Stream {
        events: Vec<StreamEvent>,
        fail_with: Option<String>,
    },
    /// Fail before producing anything
    Fail(String),
    /// Finish without producing any output
    NoOutput,
}

/// Provider that replays scripted turns in order
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<GenerationRequest>>,
    call_count: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Provider whose turns are all complete responses
    pub fn from_responses(responses: Vec<GenerationResponse>) -> Self {
        Self::new(responses.into_iter().map(ScriptedTurn::Respond).collect())
    }

    /// Queue another turn
    pub async fn push(&self, turn: ScriptedTurn) {
        self.turns.lock().await.push_back(turn);
    }

    /// Number of generation calls served so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received, in order
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_turn(&self, request: &GenerationRequest) -> Result<ScriptedTurn> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        self.turns
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ToolloopError::Generation("scripted provider exhausted".to_string()))
    }
}

/// Convenience for building scripted tool calls with generated ids
pub fn scripted_call(name: impl Into<String>, arguments: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(
        format!("call_{}", uuid::Uuid::new_v4().simple()),
        name,
        arguments,
    )
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        match self.next_turn(request).await? {
            ScriptedTurn::Respond(response) => Ok(response),
            ScriptedTurn::Stream { events, fail_with } => {
                if let Some(message) = fail_with {
                    return Err(ToolloopError::Generation(message));
                }
                Ok(collect_events(events))
            }
            ScriptedTurn::Fail(message) => Err(ToolloopError::Generation(message)),
            ScriptedTurn::NoOutput => Err(ToolloopError::NoOutputGenerated(
                "scripted turn produced no output".to_string(),
            )),
        }
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream> {
        let items: Vec<Result<StreamEvent>> = match self.next_turn(request).await? {
            ScriptedTurn::Respond(response) => response.into_events().into_iter().map(Ok).collect(),
            ScriptedTurn::Stream { events, fail_with } => events
                .into_iter()
                .map(Ok)
                .chain(fail_with.map(|m| Err(ToolloopError::Generation(m))))
                .collect(),
            ScriptedTurn::Fail(message) => return Err(ToolloopError::Generation(message)),
            ScriptedTurn::NoOutput => vec![Err(ToolloopError::NoOutputGenerated(
                "scripted turn produced no output".to_string(),
            ))],
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "scripted".to_string(),
        }
    }
}

fn collect_events(events: Vec<StreamEvent>) -> GenerationResponse {
    let mut response = GenerationResponse::text("");
    for event in events {
        match event {
            StreamEvent::TextDelta(delta) => response.text.push_str(&delta),
            StreamEvent::ToolCall(call) => response.tool_calls.push(call),
            StreamEvent::ProviderToolResult(result) => response.provider_results.push(result),
            StreamEvent::Finish { reason, usage } => {
                response.finish_reason = reason;
                response.usage = usage;
            }
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FinishReason, Message};
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_turns_in_order() {
        let provider = ScriptedProvider::from_responses(vec![
            GenerationResponse::tool_calls("", vec![scripted_call("list_files", json!({}))]),
            GenerationResponse::text("done"),
        ]);
        let request = GenerationRequest::new(vec![Message::user("go")]);

        let first = provider.generate(&request).await.unwrap();
        assert_eq!(first.finish_reason, FinishReason::ToolCalls);
        assert!(first.tool_calls[0].id.starts_with("call_"));

        let second = provider.generate(&request).await.unwrap();
        assert_eq!(second.text, "done");

        assert!(provider.generate(&request).await.is_err());
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_stream_turn_fails_after_events() {
        let provider = ScriptedProvider::new(vec![ScriptedTurn::Stream {
            events: vec![StreamEvent::TextDelta("partial".to_string())],
            fail_with: Some("connection reset".to_string()),
        }]);
        let request = GenerationRequest::new(vec![Message::user("go")]);

        let items: Vec<_> = provider
            .generate_stream(&request)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_collect_events() {
        let response = collect_events(vec![
            StreamEvent::TextDelta("a".to_string()),
            StreamEvent::TextDelta("b".to_string()),
            StreamEvent::Finish {
                reason: FinishReason::Length,
                usage: None,
            },
        ]);
        assert_eq!(response.text, "ab");
        assert_eq!(response.finish_reason, FinishReason::Length);
    }
}
