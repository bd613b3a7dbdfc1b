//! Evaluation harness for running cases
//!
//! The harness coordinates:
//! - Building the tool set of each case from stubs
//! - Running the case through a fresh agent
//! - Scoring the tool calls the model made

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::fixture::EvalCase;
use super::scorers::EvalScores;
use super::stub::{StubRegistry, StubResponse, StubTool};
use crate::agent::{Agent, AgentConfig, StopReason};
use crate::approval::AutoApprove;
use crate::error::{Result, ToolloopError};
use crate::llm::{GenerationSettings, LLMProvider, Message};
use crate::tools::{ToolDescriptor, ToolRegistry};

/// Configuration for an evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalRunConfig {
    /// Timeout for each case
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Iteration cap for each case
    pub max_iterations: usize,

    pub system_prompt: Option<String>,

    pub settings: GenerationSettings,
}

impl Default for EvalRunConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_iterations: 5,
            system_prompt: None,
            settings: GenerationSettings::default(),
        }
    }
}

/// Result of evaluating one case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub case_name: String,

    /// Whether every score is perfect and the run produced an answer
    pub passed: bool,

    pub scores: EvalScores,

    /// Names of the tools the model called, in order
    pub tool_calls: Vec<String>,

    /// Final assistant text
    pub output: String,

    pub stop_reason: Option<StopReason>,

    /// Human-readable reasons for a failed case
    pub failures: Vec<String>,

    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Error (if evaluation itself failed)
    pub error: Option<String>,
}

impl EvalResult {
    fn errored(case: &EvalCase, error: String, duration: Duration) -> Self {
        Self {
            case_name: case.name.clone(),
            passed: false,
            scores: EvalScores::zero(),
            tool_calls: Vec::new(),
            output: String::new(),
            stop_reason: None,
            failures: vec![error.clone()],
            duration,
            error: Some(error),
        }
    }
}

/// Aggregate over a set of cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub results: Vec<EvalResult>,
    pub passed: usize,
    pub total: usize,
    /// Mean scores over all cases
    pub mean: EvalScores,
}

impl EvalReport {
    pub fn from_results(results: Vec<EvalResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let mean = if total == 0 {
            EvalScores::zero()
        } else {
            let n = total as f64;
            EvalScores {
                tool_selection: results.iter().map(|r| r.scores.tool_selection).sum::<f64>() / n,
                tools_avoided: results.iter().map(|r| r.scores.tools_avoided).sum::<f64>() / n,
                tool_order: results.iter().map(|r| r.scores.tool_order).sum::<f64>() / n,
            }
        };
        Self {
            results,
            passed,
            total,
            mean,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            let status = if result.passed { "PASS" } else { "FAIL" };
            writeln!(
                f,
                "{} {} (selection {:.2}, avoided {:.2}, order {:.2}) calls: [{}]",
                status,
                result.case_name,
                result.scores.tool_selection,
                result.scores.tools_avoided,
                result.scores.tool_order,
                result.tool_calls.join(", ")
            )?;
            for failure in &result.failures {
                writeln!(f, "    - {}", failure)?;
            }
        }
        write!(
            f,
            "{}/{} passed | mean selection {:.2}, avoided {:.2}, order {:.2}",
            self.passed,
            self.total,
            self.mean.tool_selection,
            self.mean.tools_avoided,
            self.mean.tool_order
        )
    }
}

/// Runs evaluation cases against a provider with stubbed tools
pub struct EvalHarness {
    provider: Arc<dyn LLMProvider>,
    config: EvalRunConfig,
    stubs: StubRegistry,
    tools: ToolRegistry,
}

impl EvalHarness {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self::with_config(provider, EvalRunConfig::default())
    }

    pub fn with_config(provider: Arc<dyn LLMProvider>, config: EvalRunConfig) -> Self {
        Self {
            provider,
            config,
            stubs: StubRegistry::new(),
            tools: ToolRegistry::new(),
        }
    }

    /// Register a stub tool available to every case
    pub fn with_stub(mut self, stub: StubTool) -> Self {
        self.stubs.register(stub);
        self
    }

    /// Offer real tools as well; stubs with the same name win
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn stubs(&self) -> &StubRegistry {
        &self.stubs
    }

    /// Tool set of one case: case stubs, then harness stubs, then real tools.
    ///
    /// A tool the case names that none of those provide becomes a stub
    /// answering "ok".
    fn case_registry(&self, case: &EvalCase) -> Result<ToolRegistry> {
        let case_stubs = StubRegistry::from_defs(&case.stubs);

        let names: Vec<String> = if case.tools.is_empty() {
            let mut all: Vec<String> = self
                .tools
                .names()
                .into_iter()
                .chain(self.stubs.tool_names())
                .chain(case_stubs.tool_names())
                .map(str::to_string)
                .collect();
            all.sort();
            all
        } else {
            case.tools.clone()
        };

        let mut registry = ToolRegistry::new();
        for name in &names {
            if registry.contains(name) {
                continue;
            }
            let descriptor: ToolDescriptor = if let Some(stub) = case_stubs.get(name) {
                stub.descriptor()
            } else if let Some(stub) = self.stubs.get(name) {
                stub.descriptor()
            } else if let Some(tool) = self.tools.get(name) {
                tool.clone()
            } else {
                debug!(case = %case.name, tool = %name, "No stub configured, answering ok");
                Arc::new(StubTool::new(name, StubResponse::success("ok"))).descriptor()
            };
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Run one case and score it
    pub async fn run_case(&self, case: &EvalCase) -> EvalResult {
        let start = Instant::now();

        let registry = match self.case_registry(case) {
            Ok(registry) => registry,
            Err(e) => return EvalResult::errored(case, e.to_string(), start.elapsed()),
        };

        let mut config = AgentConfig::new()
            .with_max_iterations(self.config.max_iterations)
            .with_streaming(false)
            .with_compaction(false)
            .with_settings(self.config.settings.clone());
        if let Some(prompt) = &self.config.system_prompt {
            config = config.with_system_prompt(prompt.clone());
        }

        let agent = match Agent::builder(self.provider.clone())
            .registry(Arc::new(registry))
            .gate(Arc::new(AutoApprove))
            .config(config)
            .build()
        {
            Ok(agent) => agent,
            Err(e) => return EvalResult::errored(case, e.to_string(), start.elapsed()),
        };

        let run = agent.run(Vec::new(), case.input.clone(), None);
        let outcome = match tokio::time::timeout(self.config.timeout, run).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let error = ToolloopError::Eval(format!(
                    "timed out after {}",
                    humantime_serde::re::humantime::format_duration(self.config.timeout)
                ));
                warn!(case = %case.name, "Evaluation case timed out");
                return EvalResult::errored(case, error.to_string(), start.elapsed());
            }
        };

        let tool_calls = called_tools(&outcome.history);
        let scores = EvalScores::compute(
            &tool_calls,
            &case.expected_tools,
            &case.forbidden_tools,
            &case.expected_order,
        );

        let mut failures = Vec::new();
        for tool in &case.expected_tools {
            if !tool_calls.contains(tool) {
                failures.push(format!("expected tool '{}' was not called", tool));
            }
        }
        for tool in &case.forbidden_tools {
            if tool_calls.contains(tool) {
                failures.push(format!("forbidden tool '{}' was called", tool));
            }
        }
        if scores.tool_order < 1.0 {
            failures.push(format!(
                "calls did not follow the order [{}]",
                case.expected_order.join(", ")
            ));
        }
        let error = match &outcome.stop_reason {
            StopReason::GenerationFailed { message } => {
                failures.push(format!("generation failed: {}", message));
                Some(message.clone())
            }
            _ => None,
        };

        let passed = failures.is_empty() && scores.is_perfect();
        info!(case = %case.name, passed, calls = tool_calls.len(), "Evaluation case finished");

        EvalResult {
            case_name: case.name.clone(),
            passed,
            scores,
            tool_calls,
            output: outcome.text,
            stop_reason: Some(outcome.stop_reason),
            failures,
            duration: start.elapsed(),
            error,
        }
    }

    /// Run every case in order
    pub async fn run_all(&self, cases: &[EvalCase]) -> EvalReport {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            for name in self.stubs.tool_names() {
                if let Some(stub) = self.stubs.get(name) {
                    stub.reset().await;
                }
            }
            results.push(self.run_case(case).await);
        }
        EvalReport::from_results(results)
    }
}

/// Names of every tool call proposed in `history`, in order
fn called_tools(history: &[Message]) -> Vec<String> {
    history
        .iter()
        .flat_map(|m| m.tool_calls())
        .map(|call| call.name.clone())
        .collect()
}
