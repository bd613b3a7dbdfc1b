//! Approval gate
//!
//! Every local tool call the model proposes passes through an
//! [`ApprovalGate`] before it runs. Gates are asked one call at a time, in
//! the order the model produced the calls, and the loop waits for each
//! answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::llm::ToolCallRequest;

/// A proposed tool call awaiting a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Tool description from the registry, for display
    pub description: String,
    pub arguments: serde_json::Value,
}

impl ApprovalRequest {
    pub fn new(call: &ToolCallRequest, description: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            description: description.into(),
            arguments: call.arguments.clone(),
        }
    }
}

/// Outcome of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approve)
    }
}

impl From<bool> for ApprovalDecision {
    fn from(approved: bool) -> Self {
        if approved {
            ApprovalDecision::Approve
        } else {
            ApprovalDecision::Reject
        }
    }
}

/// Decides whether a proposed tool call may run.
///
/// Implementations may block for as long as they need (a human at a
/// terminal, a remote reviewer); the loop has no deadline.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Approves everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn request_approval(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approve
    }
}

/// Rejects everything
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl ApprovalGate for DenyAll {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalDecision {
        debug!(tool = %request.tool_name, "Denied by policy");
        ApprovalDecision::Reject
    }
}

/// Approves only the listed tools
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    allowed: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: tools.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allow(mut self, tool: impl Into<String>) -> Self {
        self.allowed.insert(tool.into());
        self
    }
}

#[async_trait]
impl ApprovalGate for AllowList {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalDecision {
        let decision = ApprovalDecision::from(self.allowed.contains(&request.tool_name));
        debug!(tool = %request.tool_name, ?decision, "Allow-list decision");
        decision
    }
}

/// An approval request delivered to a UI task, with the means to answer it
#[derive(Debug)]
pub struct PendingApproval {
    pub request: ApprovalRequest,
    responder: oneshot::Sender<ApprovalDecision>,
}

impl PendingApproval {
    /// Send the decision back to the waiting loop
    pub fn respond(self, decision: ApprovalDecision) {
        if self.responder.send(decision).is_err() {
            debug!(tool = %self.request.tool_name, "Approval answered after the loop stopped waiting");
        }
    }

    pub fn approve(self) {
        self.respond(ApprovalDecision::Approve);
    }

    pub fn reject(self) {
        self.respond(ApprovalDecision::Reject);
    }
}

/// Gate that forwards requests over a channel and waits for the answer.
///
/// A closed channel or a dropped [`PendingApproval`] counts as a rejection.
#[derive(Debug, Clone)]
pub struct ChannelApprovalGate {
    tx: mpsc::Sender<PendingApproval>,
}

/// Create a channel-backed gate and the receiver a UI task answers from
pub fn approval_channel(buffer: usize) -> (ChannelApprovalGate, mpsc::Receiver<PendingApproval>) {
    let (tx, rx) = mpsc::channel(buffer);
    (ChannelApprovalGate { tx }, rx)
}

#[async_trait]
impl ApprovalGate for ChannelApprovalGate {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalDecision {
        let (responder, answer) = oneshot::channel();
        let pending = PendingApproval {
            request: request.clone(),
            responder,
        };

        if self.tx.send(pending).await.is_err() {
            warn!(tool = %request.tool_name, "Approval channel closed, rejecting");
            return ApprovalDecision::Reject;
        }

        match answer.await {
            Ok(decision) => decision,
            Err(_) => {
                warn!(tool = %request.tool_name, "Approval dropped without an answer, rejecting");
                ApprovalDecision::Reject
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(tool: &str) -> ApprovalRequest {
        ApprovalRequest::new(
            &ToolCallRequest::new("c1", tool, json!({"path": "a.txt"})),
            "test tool",
        )
    }

    #[tokio::test]
    async fn test_stock_gates() {
        assert!(AutoApprove.request_approval(&request("x")).await.is_approved());
        assert!(!DenyAll.request_approval(&request("x")).await.is_approved());

        let gate = AllowList::new(["read_file"]).allow("list_files");
        assert!(gate.request_approval(&request("read_file")).await.is_approved());
        assert!(gate.request_approval(&request("list_files")).await.is_approved());
        assert!(!gate.request_approval(&request("delete_file")).await.is_approved());
    }

    #[tokio::test]
    async fn test_channel_gate_round_trip() {
        let (gate, mut rx) = approval_channel(1);

        let ui = tokio::spawn(async move {
            let pending = rx.recv().await.unwrap();
            assert_eq!(pending.request.tool_name, "write_file");
            assert_eq!(pending.request.arguments["path"], "a.txt");
            pending.approve();
        });

        let decision = gate.request_approval(&request("write_file")).await;
        ui.await.unwrap();
        assert_eq!(decision, ApprovalDecision::Approve);
    }

    #[tokio::test]
    async fn test_channel_gate_dropped_responder_rejects() {
        let (gate, mut rx) = approval_channel(1);

        tokio::spawn(async move {
            let pending = rx.recv().await.unwrap();
            drop(pending);
        });

        let decision = gate.request_approval(&request("delete_file")).await;
        assert_eq!(decision, ApprovalDecision::Reject);
    }

    #[tokio::test]
    async fn test_channel_gate_closed_receiver_rejects() {
        let (gate, rx) = approval_channel(1);
        drop(rx);
        assert_eq!(
            gate.request_approval(&request("delete_file")).await,
            ApprovalDecision::Reject
        );
    }

    #[test]
    fn test_decision_serialization() {
        assert_eq!(
            serde_json::to_string(&ApprovalDecision::Reject).unwrap(),
            "\"reject\""
        );
    }
}
