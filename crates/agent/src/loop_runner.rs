//! The agent loop: a phase machine over one `AgentState`.
//!
//! ```text
//! Perception -> MemoryRetrieval -> Decision -+-> Terminal          (final answer)
//!      ^                                     |
//!      |                                     +-> ToolExecution -> MemoryUpdate -+-> ErrorHandler -> Terminal
//!      |                                                                        +-> Terminal       (budget spent)
//!      +------------------------------------------------------------------------+
//! ```

use std::sync::Arc;
use std::time::Instant;

use cartwise_core::decision::{Decision, DecisionResult, UNKNOWN_ANSWER};
use cartwise_core::error::{Error, ToolError};
use cartwise_core::event::{DomainEvent, EventBus};
use cartwise_core::llm::LanguageModel;
use cartwise_core::memory::{MemoryRecord, MemoryType, RetrieveFilter};
use cartwise_core::state::{AgentState, ExecutedCall, MAX_STEPS_ANSWER, Phase};
use cartwise_core::tool::{ToolCallResult, ToolProvider};
use cartwise_memory::VectorMemory;
use cartwise_protocol::{CALL_PREFIX, CallCodec};
use cartwise_tools::ToolGateway;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cart::{Confirmer, basket_note};
use crate::decision::{DecisionMode, DecisionPolicy, DecisionStage, PlanContext};
use crate::history::{ConversationHistory, DEFAULT_HISTORY_TOP_K};
use crate::perception::PerceptionStage;

/// Default step budget per run.
pub const DEFAULT_MAX_STEPS: u32 = 3;

/// Default number of memories retrieved per iteration.
pub const DEFAULT_TOP_K: usize = 3;

/// What a finished run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_answer: String,

    /// The state as it was at Terminal
    pub state: AgentState,
}

/// Drives perception, retrieval, decision and tool execution until the run
/// reaches a final answer, an error, or its step budget.
pub struct AgentLoop {
    perception: PerceptionStage,

    decision: DecisionStage,

    /// Shared with other runs
    memory: Arc<VectorMemory>,

    tools: Arc<dyn ToolProvider>,

    /// Decodes call lines that reach execution unparsed
    codec: CallCodec,

    max_steps: u32,

    top_k: usize,

    user_id: Option<String>,

    event_bus: Option<Arc<EventBus>>,

    history: Option<ConversationHistory>,

    confirmer: Option<Arc<dyn Confirmer>>,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        memory: Arc<VectorMemory>,
        tools: Arc<dyn ToolProvider>,
    ) -> Self {
        Self {
            perception: PerceptionStage::new(model.clone()),
            decision: DecisionStage::new(model),
            memory,
            tools,
            codec: CallCodec::default(),
            max_steps: DEFAULT_MAX_STEPS,
            top_k: DEFAULT_TOP_K,
            user_id: None,
            event_bus: None,
            history: None,
            confirmer: None,
        }
    }

    /// Set the maximum number of tool executions per run.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max.max(1);
        self
    }

    /// Set how many memories are retrieved per iteration.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Attach cross-session history: its context is prepended to the first
    /// perception input and each finished run is recorded.
    pub fn with_history(mut self, history: ConversationHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Ask before adding a recommended product to the basket.
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_decision_mode(mut self, mode: DecisionMode) -> Self {
        self.decision = self.decision.with_mode(mode);
        self
    }

    /// Name the tool after which the next step must be a final answer.
    pub fn with_finalizing_tool(mut self, name: impl Into<String>) -> Self {
        self.decision = self.decision.with_policy(DecisionPolicy::new(name));
        self
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Run one query to completion.
    ///
    /// Only a failure to list tools is returned as an error. Everything else
    /// ends in a final answer: planning failures as `[unknown]`, tool
    /// failures as `[Error occurred: ..]`, an exhausted budget as
    /// `[Max steps reached]`.
    pub async fn run(&self, query: &str, session_id: &str) -> Result<RunOutcome, Error> {
        let gateway = ToolGateway::connect(self.tools.clone()).await?;
        let catalog = gateway.describe();

        let mut state = AgentState::new(query, session_id, self.user_id.clone(), self.max_steps);
        info!(
            session_id,
            max_steps = self.max_steps,
            tools = gateway.catalog().len(),
            "Run started"
        );

        let mut history_context = match &self.history {
            Some(history) => {
                history
                    .context(state.user_id.as_deref(), query, DEFAULT_HISTORY_TOP_K)
                    .await
            }
            None => String::new(),
        };

        self.publish_phase(&state);

        while !state.is_terminal() {
            match state.phase {
                Phase::Perception => {
                    // History only frames the first iteration
                    let input = if history_context.is_empty() {
                        state.user_input.clone()
                    } else {
                        format!("{}\n\n{}", std::mem::take(&mut history_context), state.user_input)
                    };
                    state.perception = Some(self.perception.analyze(&input).await);
                    self.enter(&mut state, Phase::MemoryRetrieval);
                }

                Phase::MemoryRetrieval => {
                    let filter = RetrieveFilter::session(state.session_id.clone())
                        .for_user(state.user_id.clone());
                    state.memory_items = match self
                        .memory
                        .retrieve(&state.user_input, self.top_k, &filter)
                        .await
                    {
                        Ok(items) => items,
                        Err(e) => {
                            warn!(session_id = %state.session_id, error = %e, "Memory retrieval failed");
                            Vec::new()
                        }
                    };
                    self.emit(DomainEvent::MemoryAccessed {
                        operation: "retrieve".into(),
                        count: state.memory_items.len(),
                        timestamp: Utc::now(),
                    });
                    self.enter(&mut state, Phase::Decision);
                }

                Phase::Decision => {
                    let perception = state
                        .perception
                        .clone()
                        .unwrap_or_else(|| PerceptionStage::fallback(&state.user_input));
                    let decision = self
                        .decision
                        .plan(PlanContext {
                            perception: &perception,
                            memories: &state.memory_items,
                            catalog: &catalog,
                            history: &state.calls,
                            last_result: state.tool_result.as_ref().map(|r| &r.result),
                        })
                        .await;

                    let next = match decision.to_decision() {
                        Ok(Decision::ToolCall { .. }) => Phase::ToolExecution,
                        Ok(Decision::FinalAnswer(answer)) => {
                            state.final_answer = Some(self.finish_answer(&decision, answer).await);
                            Phase::Terminal
                        }
                        Err(e) => {
                            warn!(error = %e, "Unusable decision");
                            state.final_answer = Some(UNKNOWN_ANSWER.to_string());
                            Phase::Terminal
                        }
                    };
                    state.decision = Some(decision);
                    self.enter(&mut state, next);
                }

                Phase::ToolExecution => {
                    let call = state.decision.as_ref().and_then(|d| d.to_decision().ok());
                    let started = Instant::now();
                    let outcome = match call {
                        Some(Decision::ToolCall { name, arguments }) => {
                            self.execute(&gateway, &name, arguments).await
                        }
                        _ => Err(ToolError::InvalidArguments("no tool call to execute".into())),
                    };

                    let tool_name = state
                        .decision
                        .as_ref()
                        .and_then(|d| d.tool_name.clone())
                        .unwrap_or_default();
                    self.emit(DomainEvent::ToolExecuted {
                        session_id: state.session_id.clone(),
                        tool_name,
                        success: outcome.is_ok(),
                        duration_ms: started.elapsed().as_millis() as u64,
                        timestamp: Utc::now(),
                    });

                    match outcome {
                        Ok(result) => {
                            state.calls.push(ExecutedCall {
                                tool_name: result.tool_name.clone(),
                                arguments: result.arguments.clone(),
                            });
                            state.tool_result = Some(result);
                        }
                        Err(e) => {
                            warn!(session_id = %state.session_id, step = state.step, error = %e, "Tool execution failed");
                            self.emit(DomainEvent::ErrorOccurred {
                                context: "tool_execution".into(),
                                error_message: e.to_string(),
                                timestamp: Utc::now(),
                            });
                            state.tool_result = None;
                            state.error = Some(e.to_string());
                        }
                    }
                    self.enter(&mut state, Phase::MemoryUpdate);
                }

                Phase::MemoryUpdate => {
                    if state.error.is_none() {
                        if let Some(result) = &state.tool_result {
                            self.remember(&state, result).await;
                        }
                    }

                    if state.error.is_some() {
                        self.enter(&mut state, Phase::ErrorHandler);
                        continue;
                    }
                    if state.final_answer.is_some() {
                        self.enter(&mut state, Phase::Terminal);
                        continue;
                    }

                    state.step += 1;
                    if state.budget_exhausted() {
                        info!(session_id = %state.session_id, step = state.step, "Step budget exhausted");
                        state.final_answer = Some(MAX_STEPS_ANSWER.to_string());
                        self.enter(&mut state, Phase::Terminal);
                        continue;
                    }

                    let previous = state
                        .tool_result
                        .as_ref()
                        .map(|r| r.result.to_string())
                        .unwrap_or_default();
                    state.user_input = state.continuation_prompt(&previous);
                    self.enter(&mut state, Phase::Perception);
                }

                Phase::ErrorHandler => {
                    let error = state.error.clone().unwrap_or_default();
                    state.final_answer = Some(format!("[Error occurred: {error}]"));
                    self.enter(&mut state, Phase::Terminal);
                }

                Phase::Terminal => break,
            }
        }

        let final_answer = state.final_answer.clone().unwrap_or_default();

        if let Some(history) = &self.history {
            if let Err(e) = history
                .add_interaction(
                    state.user_id.as_deref(),
                    &state.session_id,
                    &state.original_query,
                    &final_answer,
                )
                .await
            {
                warn!(error = %e, "Failed to record conversation history");
            }
        }

        self.emit(DomainEvent::RunFinished {
            session_id: state.session_id.clone(),
            steps: state.step,
            errored: state.error.is_some(),
            timestamp: Utc::now(),
        });
        info!(
            session_id = %state.session_id,
            steps = state.step,
            tool_calls = state.calls.len(),
            errored = state.error.is_some(),
            "Run finished"
        );

        Ok(RunOutcome { final_answer, state })
    }

    /// Execute one call. A tool name that is itself a whole call line is
    /// decoded here; explicit arguments win over decoded ones.
    async fn execute(
        &self,
        gateway: &ToolGateway,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        if name.trim_start().starts_with(CALL_PREFIX) {
            let (decoded_name, mut decoded) = self.codec.decode(name)?;
            decoded.extend(arguments);
            return gateway.execute(&decoded_name, decoded).await;
        }
        gateway.execute(name, arguments).await
    }

    async fn remember(&self, state: &AgentState, result: &ToolCallResult) {
        let text = format!(
            "Tool call: {} with {}, got: {}",
            result.tool_name,
            Value::Object(result.arguments.clone()),
            result.result
        );
        let record = MemoryRecord::new(text)
            .with_kind(MemoryType::ToolOutput)
            .with_tool(result.tool_name.clone())
            .with_tags(vec![result.tool_name.clone()])
            .with_user_query(state.user_input.clone())
            .with_session(state.session_id.clone())
            .with_user(state.user_id.clone());

        match self.memory.add(record).await {
            Ok(id) => {
                debug!(session_id = %state.session_id, id = %id, "Tool output stored");
                self.emit(DomainEvent::MemoryAccessed {
                    operation: "add".into(),
                    count: 1,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => warn!(session_id = %state.session_id, error = %e, "Failed to store tool output"),
        }
    }

    /// Apply cart confirmation to a final answer.
    async fn finish_answer(&self, decision: &DecisionResult, answer: String) -> String {
        let product = decision
            .recommended_product
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let (Some(product), Some(confirmer)) = (product, &self.confirmer) else {
            return answer;
        };

        if confirmer.confirm(product).await {
            info!(product, "Product added to basket");
            format!("{answer}{}", basket_note(product))
        } else {
            answer
        }
    }

    fn enter(&self, state: &mut AgentState, phase: Phase) {
        state.transition(phase);
        self.publish_phase(state);
    }

    fn publish_phase(&self, state: &AgentState) {
        debug!(
            session_id = %state.session_id,
            step = state.step,
            phase = %state.phase,
            "Phase entered"
        );
        self.emit(DomainEvent::PhaseEntered {
            session_id: state.session_id.clone(),
            phase: state.phase,
            step: state.step,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
