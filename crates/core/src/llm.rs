//! The LanguageModel trait over LLM backends.
//!
//! The agent needs two things from a model: free text (`generate`) and a
//! JSON value constrained by a schema (`generate_structured`). Backends that
//! support native structured output override the latter; the default asks
//! for JSON in the prompt and parses the reply.

use async_trait::async_trait;
use serde_json::Value;
use crate::error::LlmError;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this model backend.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> std::result::Result<String, LlmError>;

    /// Generate a JSON value that should satisfy `schema`.
    ///
    /// Callers still validate the value; schema adherence is best effort.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> std::result::Result<Value, LlmError> {
        let prompt = format!(
            "{prompt}\n\nRespond with a single JSON object matching this JSON Schema and nothing else:\n{schema}"
        );
        let text = self.generate(&prompt).await?;
        extract_json(&text)
    }
}

/// Pull a JSON value out of model text, tolerating markdown code fences
/// and prose around the object.
pub fn extract_json(text: &str) -> std::result::Result<Value, LlmError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let unfenced = trimmed
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| LlmError::InvalidOutput(format!("no JSON object in reply: {e}"))),
        _ => Err(LlmError::InvalidOutput(format!(
            "no JSON object in reply: {}",
            trimmed.chars().take(120).collect::<String>()
        ))),
    }
}
