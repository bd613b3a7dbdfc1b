//! Tool system
//!
//! - [`ToolRegistry`]: immutable name → descriptor map handed to the agent
//! - [`ToolExecutor`]: dispatch with timeouts and cancellation; failures become
//!   text for the model rather than errors
//! - [`builtin`]: file and shell tools
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use toolloop_core::tools::{ToolDescriptor, ToolExecutor, ToolRegistry, ToolSchema};
//! use toolloop_core::llm::ToolCallRequest;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ToolRegistry::new();
//! registry.register(ToolDescriptor::from_fn(
//!     "echo",
//!     "Echo the message back",
//!     ToolSchema::strings(&[("message", "Text to echo")]),
//!     |args| async move { Ok(args["message"].to_string()) },
//! ))?;
//!
//! let executor = ToolExecutor::new(Arc::new(registry));
//! let call = ToolCallRequest::new("call_1", "echo", json!({"message": "hi"}));
//! let execution = executor.execute(&call, None).await;
//! println!("{}", execution.to_model_text(&call.name));
//! # Ok(())
//! # }
//! ```

pub mod builtin;
mod executor;
mod registry;
mod result;
mod tool;

pub use executor::{args_hash, ToolExecutor, ToolExecutorConfig};
pub use registry::{RegistryError, ToolRegistry};
pub use result::{
    ToolError, ToolErrorKind, ToolExecution, ToolOutcome, PROVIDER_EXECUTED_MARKER,
};
pub use tool::{FnHandler, ToolDescriptor, ToolHandler, ToolMetadata, ToolSchema};

#[cfg(test)]
mod tests;
