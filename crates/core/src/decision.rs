//! Planning output: call a tool, or answer.
//!
//! `DecisionResult` is the flat shape a model fills in. The loop never
//! branches on it directly; it branches on [`Decision`], obtained through
//! [`DecisionResult::to_decision`], which enforces that exactly one of the
//! two shapes is populated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::error::DecisionError;

/// Answer used when no tool applies or planning failed.
pub const UNKNOWN_ANSWER: &str = "[unknown]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    ToolCall,
    FinalAnswer,
}

/// The flat decision record, as produced by structured generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    #[serde(default)]
    pub thought: String,

    pub decision_type: DecisionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,

    /// Side channel for the cart confirmation step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_product: Option<String>,
}

/// A validated decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ToolCall {
        name: String,
        arguments: Map<String, Value>,
    },
    FinalAnswer(String),
}

impl DecisionResult {
    pub fn tool_call(
        thought: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            thought: thought.into(),
            decision_type: DecisionType::ToolCall,
            tool_name: Some(name.into()),
            tool_input: Some(arguments),
            final_answer: None,
            recommended_product: None,
        }
    }

    pub fn final_answer(thought: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            decision_type: DecisionType::FinalAnswer,
            tool_name: None,
            tool_input: None,
            final_answer: Some(answer.into()),
            recommended_product: None,
        }
    }

    /// The terminal fallback used whenever planning fails.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self::final_answer(reason, UNKNOWN_ANSWER)
    }

    pub fn with_recommendation(mut self, product: impl Into<String>) -> Self {
        self.recommended_product = Some(product.into());
        self
    }

    /// Validate the shape and convert to the tagged form.
    pub fn to_decision(&self) -> Result<Decision, DecisionError> {
        match self.decision_type {
            DecisionType::ToolCall => {
                if self.final_answer.as_deref().is_some_and(|a| !a.is_empty()) {
                    return Err(DecisionError::InvalidShape(
                        "tool_call must not carry a final_answer".into(),
                    ));
                }
                let name = self
                    .tool_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        DecisionError::InvalidShape("tool_call requires tool_name".into())
                    })?;
                Ok(Decision::ToolCall {
                    name: name.to_string(),
                    arguments: self.tool_input.clone().unwrap_or_default(),
                })
            }
            DecisionType::FinalAnswer => {
                let has_name = self.tool_name.as_deref().is_some_and(|n| !n.trim().is_empty());
                let has_input = self.tool_input.as_ref().is_some_and(|m| !m.is_empty());
                if has_name || has_input {
                    return Err(DecisionError::InvalidShape(
                        "final_answer must not carry tool fields".into(),
                    ));
                }
                let answer = self.final_answer.clone().ok_or_else(|| {
                    DecisionError::InvalidShape("final_answer requires final_answer text".into())
                })?;
                Ok(Decision::FinalAnswer(answer))
            }
        }
    }

    /// JSON Schema handed to structured generation.
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "thought": { "type": "string" },
                "decision_type": { "type": "string", "enum": ["tool_call", "final_answer"] },
                "tool_name": { "type": "string" },
                "tool_input": { "type": "object" },
                "final_answer": { "type": "string" },
                "recommended_product": { "type": "string" }
            },
            "required": ["thought", "decision_type"]
        })
    }
}
