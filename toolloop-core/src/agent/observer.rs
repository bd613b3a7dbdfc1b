//! Run observation
//!
//! An [`AgentObserver`] receives one-way notifications while a run is in
//! progress: streamed text, tool-call boundaries, usage reports, notices and
//! the final outcome. The loop never reads anything back from it.
//!
//! [`ChannelObserver`] turns those notifications into [`AgentEvent`]s on an
//! mpsc channel, for consumers that live in another task:
//!
//! ```rust,ignore
//! let (tx, mut rx) = event_channel(100);
//! let agent = Agent::builder(provider)
//!     .observer(Arc::new(ChannelObserver::new(tx)))
//!     .build()?;
//!
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         if let AgentEvent::TextDelta { delta, .. } = event {
//!             print!("{}", delta);
//!         }
//!     }
//! });
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use super::state::{AgentOutcome, StopReason};
use crate::llm::{TokenUsage, ToolCallRequest, ToolResultPart};

/// Receives notifications during a run. Every method defaults to a no-op.
#[async_trait]
pub trait AgentObserver: Send + Sync {
    /// A piece of streamed text, in arrival order
    async fn on_text_delta(&self, _delta: &str) {}

    /// A tool call was approved and is about to run
    async fn on_tool_call_start(&self, _call: &ToolCallRequest) {}

    /// A tool call produced its result
    async fn on_tool_call_end(&self, _call: &ToolCallRequest, _result: &ToolResultPart) {}

    /// Usage reported by one model call
    async fn on_usage(&self, _usage: &TokenUsage) {}

    /// A user-facing notice such as the truncation notice
    async fn on_notice(&self, _notice: &str) {}

    async fn on_complete(&self, _outcome: &AgentOutcome) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AgentObserver for NoopObserver {}

/// Events emitted by [`ChannelObserver`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    TextDelta {
        delta: String,
        timestamp: DateTime<Utc>,
    },

    ToolCallStarted {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
        timestamp: DateTime<Utc>,
    },

    ToolCallCompleted {
        tool_call_id: String,
        tool_name: String,
        /// Result text as the model sees it
        output: String,
        is_error: bool,
        timestamp: DateTime<Utc>,
    },

    Usage {
        usage: TokenUsage,
        timestamp: DateTime<Utc>,
    },

    Notice {
        message: String,
        timestamp: DateTime<Utc>,
    },

    Completed {
        stop_reason: StopReason,
        text: String,
        iterations: usize,
        tool_executions: usize,
        usage: TokenUsage,
        timestamp: DateTime<Utc>,
    },
}

impl AgentEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            AgentEvent::TextDelta { .. } => "text_delta",
            AgentEvent::ToolCallStarted { .. } => "tool_call_started",
            AgentEvent::ToolCallCompleted { .. } => "tool_call_completed",
            AgentEvent::Usage { .. } => "usage",
            AgentEvent::Notice { .. } => "notice",
            AgentEvent::Completed { .. } => "completed",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AgentEvent::TextDelta { timestamp, .. }
            | AgentEvent::ToolCallStarted { timestamp, .. }
            | AgentEvent::ToolCallCompleted { timestamp, .. }
            | AgentEvent::Usage { timestamp, .. }
            | AgentEvent::Notice { timestamp, .. }
            | AgentEvent::Completed { timestamp, .. } => *timestamp,
        }
    }
}

/// Sender half of an event channel
pub type EventSender = mpsc::Sender<AgentEvent>;

/// Receiver half of an event channel
pub type EventReceiver = mpsc::Receiver<AgentEvent>;

/// Creates a new event channel with the specified buffer capacity.
///
/// A full buffer applies backpressure to the run; a dropped receiver
/// silently discards further events.
pub fn event_channel(buffer_size: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(buffer_size)
}

/// Observer forwarding every notification as an [`AgentEvent`]
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: EventSender,
}

impl ChannelObserver {
    pub fn new(sender: EventSender) -> Self {
        Self { sender }
    }

    async fn emit(&self, event: AgentEvent) {
        let _ = self.sender.send(event).await;
    }
}

#[async_trait]
impl AgentObserver for ChannelObserver {
    async fn on_text_delta(&self, delta: &str) {
        self.emit(AgentEvent::TextDelta {
            delta: delta.to_string(),
            timestamp: Utc::now(),
        })
        .await;
    }

    async fn on_tool_call_start(&self, call: &ToolCallRequest) {
        self.emit(AgentEvent::ToolCallStarted {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            timestamp: Utc::now(),
        })
        .await;
    }

    async fn on_tool_call_end(&self, call: &ToolCallRequest, result: &ToolResultPart) {
        self.emit(AgentEvent::ToolCallCompleted {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            output: result.output.clone(),
            is_error: result.is_error,
            timestamp: Utc::now(),
        })
        .await;
    }

    async fn on_usage(&self, usage: &TokenUsage) {
        self.emit(AgentEvent::Usage {
            usage: *usage,
            timestamp: Utc::now(),
        })
        .await;
    }

    async fn on_notice(&self, notice: &str) {
        self.emit(AgentEvent::Notice {
            message: notice.to_string(),
            timestamp: Utc::now(),
        })
        .await;
    }

    async fn on_complete(&self, outcome: &AgentOutcome) {
        self.emit(AgentEvent::Completed {
            stop_reason: outcome.stop_reason.clone(),
            text: outcome.text.clone(),
            iterations: outcome.iterations,
            tool_executions: outcome.tool_executions,
            usage: outcome.usage,
            timestamp: Utc::now(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let event = AgentEvent::ToolCallCompleted {
            tool_call_id: "c1".to_string(),
            tool_name: "list_files".to_string(),
            output: "[dir] a".to_string(),
            is_error: false,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_call_completed\""));
        assert!(json.contains("\"is_error\":false"));

        let parsed: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type(), "tool_call_completed");
    }

    #[tokio::test]
    async fn test_channel_observer_forwards_in_order() {
        let (tx, mut rx) = event_channel(10);
        let observer = ChannelObserver::new(tx);
        let call = ToolCallRequest::new("c1", "read_file", json!({"path": "a.txt"}));

        observer.on_text_delta("Reading").await;
        observer.on_tool_call_start(&call).await;
        observer
            .on_tool_call_end(
                &call,
                &ToolResultPart {
                    tool_call_id: "c1".to_string(),
                    tool_name: "read_file".to_string(),
                    output: "hello".to_string(),
                    is_error: false,
                },
            )
            .await;
        observer.on_notice("stopped").await;

        let types: Vec<&str> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| e.event_type())
        .collect();
        assert_eq!(
            types,
            vec!["text_delta", "tool_call_started", "tool_call_completed", "notice"]
        );
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = event_channel(1);
        drop(rx);
        ChannelObserver::new(tx).on_text_delta("lost").await;
    }
}
