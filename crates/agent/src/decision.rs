//! Decision: choose the next tool call, or answer.
//!
//! The model is asked for either a structured `DecisionResult` or a single
//! protocol line, depending on [`DecisionMode`]. Whatever it returns is then
//! validated twice: once for shape (`DecisionResult::to_decision`) and
//! once against [`DecisionPolicy`]. Any failure collapses into a terminal
//! fallback answer; planning is never retried.

use cartwise_config::DecisionModeConfig;
use cartwise_core::decision::{Decision, DecisionResult};
use cartwise_core::error::{DecisionError, LlmError};
use cartwise_core::llm::LanguageModel;
use cartwise_core::memory::MemoryRecord;
use cartwise_core::perception::PerceptionResult;
use cartwise_core::state::ExecutedCall;
use cartwise_core::tool::ToolOutput;
use cartwise_protocol::{ANSWER_PREFIX, CALL_PREFIX, CallCodec, ProtocolLine, SegmentPolicy};
use serde_json::Map;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default finalizing tool: after it runs, the next step must answer.
pub const DEFAULT_FINALIZING_TOOL: &str = "preety_print_product_metadata_response";

/// How the model encodes its decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecisionMode {
    /// JSON object matching `DecisionResult::schema()`
    #[default]
    Structured,
    /// One `FUNCTION_CALL:` or `FINAL_ANSWER:` line
    Text,
}

impl From<DecisionModeConfig> for DecisionMode {
    fn from(mode: DecisionModeConfig) -> Self {
        match mode {
            DecisionModeConfig::Structured => DecisionMode::Structured,
            DecisionModeConfig::Text => DecisionMode::Text,
        }
    }
}

/// Rules every decision must satisfy, enforced after the model answers.
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    finalizing_tool: String,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FINALIZING_TOOL)
    }
}

impl DecisionPolicy {
    pub fn new(finalizing_tool: impl Into<String>) -> Self {
        Self {
            finalizing_tool: finalizing_tool.into(),
        }
    }

    pub fn finalizing_tool(&self) -> &str {
        &self.finalizing_tool
    }

    /// Whether the most recent call was the finalizing tool.
    pub fn finalized(&self, history: &[ExecutedCall]) -> bool {
        history
            .last()
            .is_some_and(|c| c.tool_name == self.finalizing_tool)
    }

    pub fn check(&self, decision: &Decision, history: &[ExecutedCall]) -> Result<(), DecisionError> {
        let Decision::ToolCall { name, arguments } = decision else {
            return Ok(());
        };

        if self.finalized(history) {
            return Err(DecisionError::PolicyViolation(format!(
                "'{}' already ran; the next step must be a final answer, got a call to '{name}'",
                self.finalizing_tool
            )));
        }

        if history
            .iter()
            .any(|c| &c.tool_name == name && &c.arguments == arguments)
        {
            return Err(DecisionError::PolicyViolation(format!(
                "repeated call to '{name}' with identical arguments"
            )));
        }

        Ok(())
    }
}

/// Everything the planner sees for one decision.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub perception: &'a PerceptionResult,
    pub memories: &'a [MemoryRecord],
    /// Tool catalog rendered as `- name: description` lines
    pub catalog: &'a str,
    pub history: &'a [ExecutedCall],
    pub last_result: Option<&'a ToolOutput>,
}

pub struct DecisionStage {
    model: Arc<dyn LanguageModel>,
    mode: DecisionMode,
    policy: DecisionPolicy,
    codec: CallCodec,
}

impl DecisionStage {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            mode: DecisionMode::default(),
            policy: DecisionPolicy::default(),
            codec: CallCodec::default(),
        }
    }

    pub fn with_mode(mut self, mode: DecisionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_segment_policy(mut self, policy: SegmentPolicy) -> Self {
        self.codec = CallCodec::new(policy);
        self
    }

    pub fn mode(&self) -> DecisionMode {
        self.mode
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Plan the next step. Always returns a usable decision.
    pub async fn plan(&self, ctx: PlanContext<'_>) -> DecisionResult {
        let err = match self.try_plan(&ctx).await {
            Ok(result) => {
                debug!(
                    decision = ?result.decision_type,
                    tool = result.tool_name.as_deref().unwrap_or(""),
                    "Decision made"
                );
                return result;
            }
            Err(e) => e,
        };

        warn!(error = %err, "Decision failed, answering with fallback");
        match (&err, ctx.last_result) {
            (DecisionError::PolicyViolation(_), Some(last)) if self.policy.finalized(ctx.history) => {
                DecisionResult::final_answer(err.to_string(), last.to_string())
            }
            _ => DecisionResult::fallback(err.to_string()),
        }
    }

    async fn try_plan(&self, ctx: &PlanContext<'_>) -> Result<DecisionResult, DecisionError> {
        let prompt = self.prompt(ctx);
        let result = match self.mode {
            DecisionMode::Structured => {
                let value = self
                    .model
                    .generate_structured(&prompt, &DecisionResult::schema())
                    .await?;
                serde_json::from_value::<DecisionResult>(value)
                    .map_err(|e| DecisionError::InvalidShape(e.to_string()))?
            }
            DecisionMode::Text => {
                let text = self.model.generate(&prompt).await?;
                self.read_text(&text)?
            }
        };

        let decision = result.to_decision()?;
        self.policy.check(&decision, ctx.history)?;
        Ok(result)
    }

    /// Read a protocol line out of free text. Text before the line becomes
    /// the thought. A call line that does not decode is passed through whole
    /// as the tool name, so execution reports it as malformed.
    fn read_text(&self, text: &str) -> Result<DecisionResult, DecisionError> {
        let thought = text
            .lines()
            .map(str::trim)
            .take_while(|l| !l.starts_with(CALL_PREFIX) && !l.starts_with(ANSWER_PREFIX))
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        match self.codec.scan(text) {
            Ok(ProtocolLine::Call { name, arguments }) => {
                Ok(DecisionResult::tool_call(thought, name, arguments))
            }
            Ok(ProtocolLine::FinalAnswer(answer)) => Ok(DecisionResult::final_answer(thought, answer)),
            Err(e) => match text.lines().map(str::trim).find(|l| l.starts_with(CALL_PREFIX)) {
                Some(raw) => Ok(DecisionResult::tool_call(thought, raw, Map::new())),
                None => Err(DecisionError::Llm(LlmError::InvalidOutput(e.to_string()))),
            },
        }
    }

    pub fn prompt(&self, ctx: &PlanContext<'_>) -> String {
        let p = ctx.perception;
        let memories = if ctx.memories.is_empty() {
            "None".to_string()
        } else {
            ctx.memories
                .iter()
                .map(|m| format!("- {}", m.text))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let calls = if ctx.history.is_empty() {
            "None".to_string()
        } else {
            ctx.history
                .iter()
                .map(|c| {
                    format!(
                        "- {} {}",
                        c.tool_name,
                        serde_json::Value::Object(c.arguments.clone())
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let format = match self.mode {
            DecisionMode::Structured => {
                "Respond with a JSON object: {\"thought\": ..., \"decision_type\": \"tool_call\" | \"final_answer\", \
                 \"tool_name\": ..., \"tool_input\": {...}, \"final_answer\": ..., \"recommended_product\": ...}. \
                 Fill tool_name and tool_input only for tool_call, final_answer only for final_answer."
            }
            DecisionMode::Text => {
                "Respond with exactly one line, either\n\
                 FUNCTION_CALL: tool_name|key=value|nested.key=value\n\
                 or\n\
                 FINAL_ANSWER: your answer"
            }
        };

        format!(
            "You are the decision module of an e-commerce product search agent.\n\n\
             User input: {}\n\
             Intent: {}\n\
             Entities: {}\n\
             Tool hint: {}\n\n\
             Relevant memories:\n{memories}\n\n\
             Tool calls so far:\n{calls}\n\n\
             Available tools:\n{}\n\n\
             Rules:\n\
             1. Never repeat a tool call with identical arguments.\n\
             2. After '{}' the next step must be a final answer built from its result.\n\
             3. If no tool applies, answer FINAL_ANSWER: [unknown].\n\
             4. Keep to a few attempts; answer as soon as the result is good enough.\n\n\
             {format}",
            p.user_input,
            p.intent.as_deref().unwrap_or("unknown"),
            if p.entities.is_empty() {
                "none".to_string()
            } else {
                p.entities.join(", ")
            },
            p.tool_hint.as_deref().unwrap_or("none"),
            ctx.catalog,
            self.policy.finalizing_tool,
        )
    }
}
