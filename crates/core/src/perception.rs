//! Structured reading of a user request.

use serde::{Deserialize, Serialize};

/// Intent and entities extracted from one user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionResult {
    /// The original text
    #[serde(default)]
    pub user_input: String,

    /// A refined search query, when the model produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_user_input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    /// Free-form attributes ("green", "running shoes", "under $50")
    #[serde(default)]
    pub entities: Vec<String>,

    /// Suggested tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_hint: Option<String>,
}

impl PerceptionResult {
    /// The query that retrieval and search should use.
    pub fn effective_query(&self) -> &str {
        self.modified_user_input
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(&self.user_input)
    }

    /// JSON Schema handed to structured generation.
    pub fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_input": { "type": "string" },
                "modified_user_input": { "type": "string" },
                "intent": { "type": "string" },
                "entities": { "type": "array", "items": { "type": "string" } },
                "tool_hint": { "type": "string" }
            },
            "required": ["user_input", "entities"]
        })
    }
}
