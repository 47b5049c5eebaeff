//! Memory records and the embedder seam.
//!
//! A `MemoryRecord` is an immutable fact the agent produced or observed.
//! Records are embedded once on insertion; retrieval is a nearest-neighbour
//! search followed by metadata filtering (see `cartwise-memory`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// What kind of fact a record holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Preference,
    ToolOutput,
    #[default]
    Fact,
    Query,
    System,
    ConversationHistory,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Preference => "preference",
            MemoryType::ToolOutput => "tool_output",
            MemoryType::Fact => "fact",
            MemoryType::Query => "query",
            MemoryType::System => "system",
            MemoryType::ConversationHistory => "conversation_history",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique ID, assigned by the store when empty
    #[serde(default)]
    pub id: String,

    /// The remembered text
    pub text: String,

    #[serde(rename = "type", default)]
    pub kind: MemoryType,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// The user input that led to this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl MemoryRecord {
    /// A `fact` record stamped with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            text: text.into(),
            kind: MemoryType::default(),
            timestamp: Utc::now(),
            tool_name: None,
            user_query: None,
            tags: Vec::new(),
            user_id: None,
            session_id: None,
        }
    }

    pub fn with_kind(mut self, kind: MemoryType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_user_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = Some(query.into());
        self
    }
}

/// Post-search filters. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrieveFilter {
    /// Accept any of these types (empty = all)
    pub types: Vec<MemoryType>,

    /// Accept records carrying at least one of these tags (empty = all)
    pub tags: Vec<String>,

    pub session_id: Option<String>,

    pub user_id: Option<String>,
}

impl RetrieveFilter {
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn for_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn of_type(mut self, kind: MemoryType) -> Self {
        self.types.push(kind);
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Whether a record passes every populated filter.
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if !self.types.is_empty() && !self.types.contains(&record.kind) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| record.tags.contains(t)) {
            return false;
        }
        if let Some(session) = &self.session_id {
            if record.session_id.as_ref() != Some(session) {
                return false;
            }
        }
        if let Some(user) = &self.user_id {
            if record.user_id.as_ref() != Some(user) {
                return false;
            }
        }
        true
    }
}

/// Turns text into a fixed-length vector.
///
/// Implementations: remote OpenAI-compatible `/embeddings`, a local
/// feature-hashing embedder, and counting stubs in tests.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_defaults_to_fact() {
        let record = MemoryRecord::new("likes green");
        assert_eq!(record.kind, MemoryType::Fact);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn record_serializes_type_field() {
        let record = MemoryRecord::new("Tool call: search").with_kind(MemoryType::ToolOutput);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""type":"tool_output""#));
        let back: MemoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, MemoryType::ToolOutput);
    }

    #[test]
    fn filter_requires_every_populated_field() {
        let record = MemoryRecord::new("x")
            .with_session("s1")
            .with_user(Some("u1".into()))
            .with_tags(vec!["search".into()])
            .with_kind(MemoryType::ToolOutput);

        assert!(RetrieveFilter::default().matches(&record));
        assert!(RetrieveFilter::session("s1").matches(&record));
        assert!(!RetrieveFilter::session("s2").matches(&record));
        assert!(
            RetrieveFilter::session("s1")
                .for_user(Some("u1".into()))
                .of_type(MemoryType::ToolOutput)
                .tagged("search")
                .matches(&record)
        );
        assert!(!RetrieveFilter::default().of_type(MemoryType::Fact).matches(&record));
        assert!(!RetrieveFilter::default().tagged("cart").matches(&record));
        assert!(!RetrieveFilter::default().for_user(Some("u2".into())).matches(&record));
    }

    #[test]
    fn session_filter_rejects_unscoped_records() {
        let record = MemoryRecord::new("global");
        assert!(!RetrieveFilter::session("s1").matches(&record));
    }
}
