//! The agent loop

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::config::{AgentConfig, RejectionPolicy};
use super::conversation::Conversation;
use super::observer::{AgentObserver, NoopObserver};
use super::state::{
    AgentOutcome, LoopState, StopReason, FALLBACK_MESSAGE, MISSING_PROVIDER_RESULT,
    REJECTED_RESULT, SKIPPED_RESULT, TRUNCATION_NOTICE,
};
use crate::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest, DenyAll};
use crate::context::{Compactor, ContextConfig};
use crate::error::{Result, ToolloopError};
use crate::llm::{
    FinishReason, GenerationRequest, LLMProvider, Message, StreamEvent, TokenUsage,
    ToolCallRequest, ToolResultPart,
};
use crate::tools::{ToolExecutor, ToolExecutorConfig, ToolRegistry};

/// Tool-calling agent.
///
/// Holds an immutable tool set, a provider, an approval gate and an observer.
/// Each call to [`Agent::run`] processes one user message:
///
/// ```rust,ignore
/// let agent = Agent::builder(provider)
///     .registry(Arc::new(tools::builtin::registry(&workdir)?))
///     .gate(Arc::new(AllowList::new(["read_file", "list_files"])))
///     .build()?;
///
/// let outcome = agent.run(history, "List files in /tmp", None).await;
/// println!("{}", outcome.text);
/// history = outcome.history;
/// ```
pub struct Agent {
    provider: Arc<dyn LLMProvider>,
    executor: ToolExecutor,
    gate: Arc<dyn ApprovalGate>,
    observer: Arc<dyn AgentObserver>,
    compactor: Option<Compactor>,
    config: AgentConfig,
}

/// Mutable bookkeeping for one run
struct RunState {
    conversation: Conversation,
    iterations: usize,
    tool_executions: usize,
    usage: TokenUsage,
    text: String,
}

/// What one model call produced
#[derive(Default)]
struct ModelTurn {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
    provider_results: Vec<ToolResultPart>,
    finish_reason: Option<FinishReason>,
    usage: Option<TokenUsage>,
    error: Option<ToolloopError>,
    cancelled: bool,
}

impl Agent {
    pub fn builder(provider: Arc<dyn LLMProvider>) -> AgentBuilder {
        AgentBuilder::new(provider)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.executor.registry()
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Process one user message.
    ///
    /// `history` is the caller-owned conversation so far (system messages in it
    /// are ignored). The returned outcome carries the updated history, again
    /// without the system message. This never fails: generation errors become
    /// [`StopReason::GenerationFailed`] with [`FALLBACK_MESSAGE`] as the text.
    pub async fn run(
        &self,
        history: Vec<Message>,
        user_message: impl Into<String>,
        cancel: Option<CancellationToken>,
    ) -> AgentOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("agent_run", run_id = %run_id);
        self.run_inner(history, user_message.into(), cancel.unwrap_or_default())
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        history: Vec<Message>,
        user_message: String,
        cancel: CancellationToken,
    ) -> AgentOutcome {
        let (history, compacted) = self.maybe_compact(history).await;

        let mut run = RunState {
            conversation: Conversation::new(
                self.config.system_prompt.as_deref(),
                history,
                user_message,
            ),
            iterations: 0,
            tool_executions: 0,
            usage: TokenUsage::default(),
            text: String::new(),
        };

        let mut state = LoopState::AwaitingModel;
        let stop_reason = loop {
            state = match state {
                LoopState::AwaitingModel => self.await_model(&mut run, &cancel).await,
                LoopState::ProcessingTools(calls) => {
                    self.process_tools(&mut run, calls, &cancel).await
                }
                LoopState::Done(reason) => break reason,
            };
        };

        self.finish(run, stop_reason, compacted).await
    }

    async fn maybe_compact(&self, history: Vec<Message>) -> (Vec<Message>, bool) {
        let Some(compactor) = self.compactor.as_ref().filter(|_| self.config.compaction) else {
            return (history, false);
        };
        if !compactor.needs_compaction(&history) {
            return (history, false);
        }

        match compactor.compact_detailed(&history).await {
            Ok(result) => {
                info!(
                    tokens_before = result.tokens_before,
                    tokens_after = result.tokens_after,
                    "History compacted before turn"
                );
                (result.messages, true)
            }
            Err(e) => {
                warn!(error = %e, "Compaction failed, keeping full history");
                (history, false)
            }
        }
    }

    async fn await_model(&self, run: &mut RunState, cancel: &CancellationToken) -> LoopState {
        if cancel.is_cancelled() {
            return LoopState::Done(StopReason::Cancelled);
        }
        if run.iterations >= self.config.max_iterations {
            warn!(
                max_iterations = self.config.max_iterations,
                "Iteration limit reached"
            );
            return LoopState::Done(StopReason::IterationLimit);
        }
        run.iterations += 1;

        debug!(
            iteration = run.iterations,
            messages = run.conversation.len(),
            "Requesting generation"
        );
        let request = GenerationRequest::new(run.conversation.messages().to_vec())
            .with_tools(self.executor.registry().definitions())
            .with_settings(self.config.settings.clone());

        let turn = if self.config.streaming {
            self.stream_turn(&request, cancel).await
        } else {
            self.complete_turn(&request, cancel).await
        };

        if let Some(usage) = turn.usage {
            run.usage.add(&usage);
            self.observer.on_usage(&usage).await;
        }

        if turn.cancelled {
            if !turn.text.is_empty() {
                self.record_answer(run, turn.text);
            }
            return LoopState::Done(StopReason::Cancelled);
        }

        if let Some(error) = turn.error {
            if !turn.text.is_empty() {
                warn!(
                    error = %error,
                    dropped_tool_calls = turn.tool_calls.len(),
                    "Generation failed after partial text, keeping it"
                );
                self.record_answer(run, turn.text);
                return LoopState::Done(StopReason::Completed);
            }
            error!(
                error = %error,
                no_output = error.is_no_output(),
                "Generation failed without output"
            );
            self.observer.on_text_delta(FALLBACK_MESSAGE).await;
            self.record_answer(run, FALLBACK_MESSAGE.to_string());
            return LoopState::Done(StopReason::GenerationFailed {
                message: error.to_string(),
            });
        }

        let finish_reason = turn.finish_reason.unwrap_or(FinishReason::Stop);
        if finish_reason == FinishReason::ToolCalls && !turn.tool_calls.is_empty() {
            debug!(calls = turn.tool_calls.len(), "Model requested tools");
            run.conversation.push(Message::assistant_with_tool_calls(
                &turn.text,
                &turn.tool_calls,
            ));
            for result in turn.provider_results {
                if turn.tool_calls.iter().any(|c| c.id == result.tool_call_id) {
                    run.conversation.push_tool_result(result);
                } else {
                    warn!(tool_call_id = %result.tool_call_id, "Dropping provider result with no matching call");
                }
            }
            if !turn.text.is_empty() {
                run.text = turn.text;
            }
            return LoopState::ProcessingTools(turn.tool_calls);
        }

        if !turn.tool_calls.is_empty() {
            warn!(
                ?finish_reason,
                dropped = turn.tool_calls.len(),
                "Dropping tool calls that arrived without a tool-calls finish"
            );
        }

        if turn.text.is_empty() {
            debug!(?finish_reason, "Model finished without text");
            self.observer.on_text_delta(FALLBACK_MESSAGE).await;
            self.record_answer(run, FALLBACK_MESSAGE.to_string());
        } else {
            self.record_answer(run, turn.text);
        }
        LoopState::Done(StopReason::Completed)
    }

    /// Append a final assistant answer
    fn record_answer(&self, run: &mut RunState, text: String) {
        run.conversation.push(Message::assistant(text.clone()));
        run.text = text;
    }

    async fn stream_turn(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> ModelTurn {
        let mut turn = ModelTurn::default();

        let mut stream = tokio::select! {
            _ = cancel.cancelled() => {
                turn.cancelled = true;
                return turn;
            }
            result = self.provider.generate_stream(request) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    turn.error = Some(e);
                    return turn;
                }
            },
        };

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    turn.cancelled = true;
                    return turn;
                }
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Ok(StreamEvent::TextDelta(delta))) => {
                    if delta.is_empty() {
                        continue;
                    }
                    self.observer.on_text_delta(&delta).await;
                    turn.text.push_str(&delta);
                }
                Some(Ok(StreamEvent::ToolCall(call))) => turn.tool_calls.push(call),
                Some(Ok(StreamEvent::ProviderToolResult(result))) => {
                    turn.provider_results.push(result)
                }
                Some(Ok(StreamEvent::Finish { reason, usage })) => {
                    turn.finish_reason = Some(reason);
                    turn.usage = usage;
                }
                Some(Err(e)) => {
                    turn.error = Some(e);
                    break;
                }
            }
        }

        if turn.error.is_none()
            && turn.finish_reason.is_none()
            && turn.text.is_empty()
            && turn.tool_calls.is_empty()
        {
            turn.error = Some(ToolloopError::NoOutputGenerated(
                "stream ended without any events".to_string(),
            ));
        }
        turn
    }

    async fn complete_turn(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> ModelTurn {
        let mut turn = ModelTurn::default();
        tokio::select! {
            _ = cancel.cancelled() => turn.cancelled = true,
            result = self.provider.generate(request) => match result {
                Ok(response) => {
                    if !response.text.is_empty() {
                        self.observer.on_text_delta(&response.text).await;
                    }
                    turn.text = response.text;
                    turn.tool_calls = response.tool_calls;
                    turn.provider_results = response.provider_results;
                    turn.finish_reason = Some(response.finish_reason);
                    turn.usage = response.usage;
                }
                Err(e) => turn.error = Some(e),
            },
        }
        turn
    }

    async fn process_tools(
        &self,
        run: &mut RunState,
        calls: Vec<ToolCallRequest>,
        cancel: &CancellationToken,
    ) -> LoopState {
        for (index, call) in calls.iter().enumerate() {
            if cancel.is_cancelled() {
                return LoopState::Done(StopReason::Cancelled);
            }

            if self.executor.is_provider_tool(&call.name) {
                if !run.conversation.has_result_for(&call.id) {
                    warn!(tool = %call.name, call_id = %call.id, "Provider tool returned no result");
                    run.conversation
                        .push_tool_result(synthetic_result(call, MISSING_PROVIDER_RESULT));
                }
                continue;
            }

            match self.approval(call, cancel).await {
                None => return LoopState::Done(StopReason::Cancelled),
                Some(ApprovalDecision::Approve) => {}
                Some(ApprovalDecision::Reject) => {
                    warn!(tool = %call.name, call_id = %call.id, "Tool call rejected");
                    return match self.config.rejection_policy {
                        RejectionPolicy::EndTurn => LoopState::Done(StopReason::Rejected {
                            tool_name: call.name.clone(),
                        }),
                        RejectionPolicy::ReportToModel => {
                            run.conversation
                                .push_tool_result(synthetic_result(call, REJECTED_RESULT));
                            for skipped in &calls[index + 1..] {
                                if !run.conversation.has_result_for(&skipped.id) {
                                    run.conversation
                                        .push_tool_result(synthetic_result(skipped, SKIPPED_RESULT));
                                }
                            }
                            LoopState::AwaitingModel
                        }
                    };
                }
            }

            self.observer.on_tool_call_start(call).await;
            let execution = self.executor.execute(call, Some(cancel)).await;
            run.tool_executions += 1;

            let result = ToolResultPart {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                output: execution.to_model_text(&call.name),
                is_error: execution.is_error(),
            };
            self.observer.on_tool_call_end(call, &result).await;
            run.conversation.push_tool_result(result);
        }

        LoopState::AwaitingModel
    }

    /// Ask the gate about `call`; `None` means the run was cancelled while waiting.
    ///
    /// Unknown tools skip the gate: the executor only reports them to the model.
    async fn approval(
        &self,
        call: &ToolCallRequest,
        cancel: &CancellationToken,
    ) -> Option<ApprovalDecision> {
        if !self.config.require_approval {
            return Some(ApprovalDecision::Approve);
        }
        let Some(tool) = self.executor.registry().get(&call.name) else {
            return Some(ApprovalDecision::Approve);
        };

        let request = ApprovalRequest::new(call, tool.metadata.description.clone());
        tokio::select! {
            _ = cancel.cancelled() => None,
            decision = self.gate.request_approval(&request) => Some(decision),
        }
    }

    async fn finish(&self, run: RunState, stop_reason: StopReason, compacted: bool) -> AgentOutcome {
        if let Err(violation) = run.conversation.check_pairing() {
            error!(%violation, "Conversation violates tool pairing");
        }

        let notice = match &stop_reason {
            StopReason::IterationLimit => Some(TRUNCATION_NOTICE.to_string()),
            StopReason::Rejected { tool_name } => Some(format!(
                "[The {} call was rejected, so this turn ended.]",
                tool_name
            )),
            StopReason::Cancelled => Some("[Cancelled.]".to_string()),
            StopReason::Completed | StopReason::GenerationFailed { .. } => None,
        };
        if let Some(notice) = &notice {
            self.observer.on_notice(notice).await;
        }

        info!(
            stop_reason = %stop_reason,
            iterations = run.iterations,
            tool_executions = run.tool_executions,
            total_tokens = run.usage.total_tokens,
            "Agent run finished"
        );

        let outcome = AgentOutcome {
            text: run.text,
            history: run.conversation.into_history(),
            stop_reason,
            iterations: run.iterations,
            tool_executions: run.tool_executions,
            usage: run.usage,
            notice,
            compacted,
        };
        self.observer.on_complete(&outcome).await;
        outcome
    }
}

fn synthetic_result(call: &ToolCallRequest, output: &str) -> ToolResultPart {
    ToolResultPart {
        tool_call_id: call.id.clone(),
        tool_name: call.name.clone(),
        output: output.to_string(),
        is_error: true,
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.provider.model_info().model_name)
            .field("tools", &self.executor.registry().names())
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    provider: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    gate: Arc<dyn ApprovalGate>,
    observer: Arc<dyn AgentObserver>,
    config: AgentConfig,
    executor_config: ToolExecutorConfig,
    context_config: ContextConfig,
    compactor: Option<Compactor>,
}

impl AgentBuilder {
    /// Start a builder with no tools, a gate that rejects everything and no observer
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            registry: Arc::new(ToolRegistry::new()),
            gate: Arc::new(DenyAll),
            observer: Arc::new(NoopObserver),
            config: AgentConfig::default(),
            executor_config: ToolExecutorConfig::default(),
            context_config: ContextConfig::default(),
            compactor: None,
        }
    }

    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn executor_config(mut self, config: ToolExecutorConfig) -> Self {
        self.executor_config = config;
        self
    }

    pub fn context_config(mut self, config: ContextConfig) -> Self {
        self.context_config = config;
        self
    }

    /// Use a specific compactor (for example one backed by a cheaper model)
    pub fn compactor(mut self, compactor: Compactor) -> Self {
        self.compactor = Some(compactor);
        self
    }

    pub fn build(self) -> Result<Agent> {
        if self.config.max_iterations == 0 {
            return Err(ToolloopError::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let compactor = match (self.compactor, self.config.compaction) {
            (Some(compactor), _) => Some(compactor),
            (None, true) => Some(Compactor::new(self.provider.clone(), self.context_config)),
            (None, false) => None,
        };

        Ok(Agent {
            executor: ToolExecutor::with_config(self.registry, self.executor_config),
            provider: self.provider,
            gate: self.gate,
            observer: self.observer,
            compactor,
            config: self.config,
        })
    }
}
