//! # Toolloop - A tool-calling loop for LLM agents
//!
//! Toolloop runs a conversation with a language model that may call tools:
//! - Tool registry with JSON-schema descriptions and provider-executed tools
//! - Executor with per-tool timeouts, argument checks and cancellation
//! - Approval gate consulted before every side-effecting call
//! - Context estimation and summarizing compaction
//! - Agent loop with an iteration cap, streaming and event observers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolloop_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let provider = Arc::new(OpenAIProvider::from_env(None::<String>)?);
//!     let registry = builtin::registry(std::path::Path::new("."))?;
//!
//!     let agent = Agent::builder(provider)
//!         .registry(Arc::new(registry))
//!         .gate(Arc::new(AutoApprove))
//!         .build()?;
//!
//!     let outcome = agent.run(Vec::new(), "What files are here?", None).await;
//!     println!("{}", outcome.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `llm-openai` (default): OpenAI-compatible chat completions provider

pub mod agent;
pub mod approval;
pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod llm;
pub mod tools;

pub use error::{Result, ToolloopError};

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{
        event_channel, Agent, AgentBuilder, AgentConfig, AgentEvent, AgentObserver, AgentOutcome,
        ChannelObserver, NoopObserver, RejectionPolicy, StopReason,
    };
    pub use crate::approval::{
        approval_channel, AllowList, ApprovalDecision, ApprovalGate, ApprovalRequest, ChannelApprovalGate,
        AutoApprove, DenyAll, PendingApproval,
    };
    pub use crate::config::{LLMProvider as LLMProviderType, LLMProviderConfig, ToolloopConfig};
    pub use crate::context::{CompactionResult, Compactor, ContextConfig, TokenEstimate};
    pub use crate::error::{Result, ToolloopError};
    pub use crate::eval::{EvalCase, EvalHarness, EvalReport, EvalSuite, StubTool};
    #[cfg(feature = "llm-openai")]
    pub use crate::llm::providers::OpenAIProvider;
    pub use crate::llm::{
        FinishReason, GenerationRequest, GenerationResponse, GenerationSettings, LLMProvider,
        LLMProviderFactory, Message, Role, ScriptedProvider, StreamEvent, TokenUsage,
        ToolCallRequest, ToolResultPart,
    };
    pub use crate::tools::{
        builtin, FnHandler, RegistryError, ToolDescriptor, ToolError, ToolExecution,
        ToolExecutor, ToolExecutorConfig, ToolHandler, ToolMetadata, ToolOutcome, ToolRegistry,
        ToolSchema,
    };
}
