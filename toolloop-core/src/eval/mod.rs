//! Offline evaluation of tool selection
//!
//! An [`EvalCase`] gives the agent a user message and a tool subset, then
//! checks which tools the model chose to call. Tools are replaced with
//! [`StubTool`]s returning predetermined responses, so a case never touches
//! the filesystem or the shell. Pair the harness with a
//! [`ScriptedProvider`](crate::llm::ScriptedProvider) for fully deterministic
//! runs, or with a real provider to measure a model.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolloop_core::eval::{EvalHarness, EvalSuite};
//! use toolloop_core::llm::providers::OpenAIProvider;
//!
//! # async fn demo() -> toolloop_core::Result<()> {
//! let suite = EvalSuite::load("evals/file_tools.yaml")?;
//! let provider = Arc::new(OpenAIProvider::from_env(None::<String>)?);
//!
//! let report = EvalHarness::new(provider).run_all(&suite.cases).await;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

mod fixture;
mod harness;
mod scorers;
mod stub;

pub use fixture::{EvalCase, EvalSuite, StubResponseDef};
pub use harness::{EvalHarness, EvalReport, EvalResult, EvalRunConfig};
pub use scorers::{tool_order, tool_selection, tools_avoided, EvalScores};
pub use stub::{StubRegistry, StubResponse, StubTool};
