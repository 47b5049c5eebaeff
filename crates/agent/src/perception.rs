//! Perception: turn raw user input into intent, entities and a tool hint.

use cartwise_core::error::LlmError;
use cartwise_core::llm::LanguageModel;
use cartwise_core::perception::PerceptionResult;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Intent assumed when the model cannot be consulted.
pub const FALLBACK_INTENT: &str = "product_search";

/// Tool suggested when the model cannot be consulted.
pub const FALLBACK_TOOL_HINT: &str = "search_product_documents";

pub struct PerceptionStage {
    model: Arc<dyn LanguageModel>,
}

impl PerceptionStage {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// The extraction prompt for `user_input`.
    pub fn prompt(user_input: &str) -> String {
        format!(
            "You are the perception module of an e-commerce product search agent.\n\
             Analyze the user input and extract:\n\
             - intent: what the user wants (e.g. product_search, refine_search, add_to_cart)\n\
             - entities: product attributes as short strings (e.g. \"Colour:Green\", \"BrandName:Nike\", \"under $50\")\n\
             - modified_user_input: the request rewritten as a clean search query\n\
             - tool_hint: the tool most likely to help, or null\n\n\
             Respond with a JSON object only.\n\n\
             User input: \"{user_input}\""
        )
    }

    /// Analyze `user_input`. Never fails: any model problem yields the
    /// fallback reading.
    pub async fn analyze(&self, user_input: &str) -> PerceptionResult {
        match self.try_analyze(user_input).await {
            Ok(result) => {
                debug!(
                    intent = result.intent.as_deref().unwrap_or(""),
                    entities = result.entities.len(),
                    "Perception complete"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "Perception failed, using fallback");
                Self::fallback(user_input)
            }
        }
    }

    async fn try_analyze(&self, user_input: &str) -> Result<PerceptionResult, LlmError> {
        let mut value = self
            .model
            .generate_structured(&Self::prompt(user_input), &PerceptionResult::schema())
            .await?;
        flatten_entities(&mut value);

        let mut result: PerceptionResult = serde_json::from_value(value)
            .map_err(|e| LlmError::InvalidOutput(format!("perception: {e}")))?;
        if result.user_input.trim().is_empty() {
            result.user_input = user_input.to_string();
        }
        Ok(result)
    }

    pub fn fallback(user_input: &str) -> PerceptionResult {
        PerceptionResult {
            user_input: user_input.to_string(),
            modified_user_input: Some(user_input.to_string()),
            intent: Some(FALLBACK_INTENT.to_string()),
            entities: Vec::new(),
            tool_hint: Some(FALLBACK_TOOL_HINT.to_string()),
        }
    }
}

/// Models sometimes return entities as an object (`{"colour": "green"}`) or
/// mix in non-string items. Keep the values as strings.
fn flatten_entities(value: &mut Value) {
    let Some(entities) = value.get_mut("entities") else {
        return;
    };
    let items: Vec<Value> = match &*entities {
        Value::Object(map) => map.values().cloned().collect(),
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    };
    *entities = Value::Array(
        items
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            })
            .collect(),
    );
}
