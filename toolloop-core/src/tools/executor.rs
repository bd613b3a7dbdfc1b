//! Tool executor
//!
//! Dispatches a tool call to its registered handler. Every failure mode
//! (unknown tool, bad arguments, handler error or panic, timeout, cancellation) comes
//! back as a [`ToolExecution`] the model can read; nothing here returns an
//! error to the loop.

use super::registry::ToolRegistry;
use super::result::{ToolError, ToolExecution, ToolOutcome};
use crate::llm::ToolCallRequest;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutorConfig {
    /// Timeout applied to every tool without an override; `None` disables it
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub default_timeout: Option<Duration>,

    /// Per-tool timeout overrides
    #[serde(default)]
    pub tool_timeouts: HashMap<String, humantime_serde::Serde<Duration>>,

    /// Check arguments against the tool's required fields before calling it
    #[serde(default = "default_validate")]
    pub validate_arguments: bool,
}

fn default_timeout() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

fn default_validate() -> bool {
    true
}

impl Default for ToolExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            tool_timeouts: HashMap::new(),
            validate_arguments: true,
        }
    }
}

impl ToolExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Add a tool-specific timeout
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.tool_timeouts.insert(tool_name.into(), timeout.into());
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_arguments = validate;
        self
    }

    /// Effective timeout for a tool
    pub fn timeout_for(&self, tool_name: &str) -> Option<Duration> {
        self.tool_timeouts
            .get(tool_name)
            .map(|t| t.clone().into_inner())
            .or(self.default_timeout)
    }
}

/// Text of a panic payload from `panic!` or a failed `unwrap`
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Short stable hash of tool arguments, for log correlation
pub fn args_hash(args: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(args.to_string().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Dispatches tool calls against an immutable registry
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    config: ToolExecutorConfig,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_config(registry, ToolExecutorConfig::default())
    }

    pub fn with_config(registry: Arc<ToolRegistry>, config: ToolExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ToolExecutorConfig {
        &self.config
    }

    /// Whether `name` is registered as a provider tool
    pub fn is_provider_tool(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .is_some_and(|tool| tool.is_provider_tool())
    }

    /// Execute one tool call.
    ///
    /// The cancellation token is checked before the handler starts and raced
    /// against it while it runs.
    pub async fn execute(
        &self,
        call: &ToolCallRequest,
        cancel: Option<&CancellationToken>,
    ) -> ToolExecution {
        let span = info_span!(
            "tool_call",
            tool = %call.name,
            call_id = %call.id,
            args_hash = %args_hash(&call.arguments),
        );
        self.execute_inner(call, cancel).instrument(span).await
    }

    async fn execute_inner(
        &self,
        call: &ToolCallRequest,
        cancel: Option<&CancellationToken>,
    ) -> ToolExecution {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!("Model requested an unknown tool");
            return ToolExecution::UnknownTool(call.name.clone());
        };

        let Some(handler) = tool.handler.clone() else {
            debug!("Provider tool, skipping local execution");
            return ToolExecution::ProviderExecuted;
        };

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return ToolExecution::Completed(ToolError::cancelled().into());
        }

        if self.config.validate_arguments {
            if let Err(error) = tool.schema.check(&call.arguments) {
                debug!(error = %error, "Rejected tool arguments");
                return ToolExecution::Completed(error.into());
            }
        }

        let started = Instant::now();
        let tool_timeout = self.config.timeout_for(&call.name);
        let guarded = AssertUnwindSafe(handler.call(call.arguments.clone()))
            .catch_unwind()
            .map(|result| {
                result.unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "Tool handler panicked");
                    Err(ToolError::execution(format!("tool panicked: {}", message)))
                })
            });
        let execution = async {
            match tool_timeout {
                Some(limit) => match timeout(limit, guarded).await {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::timeout(limit)),
                },
                None => guarded.await,
            }
        };

        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(ToolError::cancelled()),
                    res = execution => res,
                }
            }
            None => execution.await,
        };

        let duration = started.elapsed();
        match &result {
            Ok(output) => debug!(?duration, bytes = output.len(), "Tool completed"),
            Err(error) => debug!(?duration, kind = ?error.kind, error = %error, "Tool failed"),
        }

        ToolExecution::Completed(ToolOutcome::from(result))
    }
}
