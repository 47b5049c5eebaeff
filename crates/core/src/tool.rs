//! Tool collaborator seam: catalog listing, invocation, and result shapes.
//!
//! Tools are what give the agent the ability to act: search the product
//! catalog, rerank results, pretty-print metadata. A `ToolProvider` exposes a
//! catalog and accepts calls; the gateway in `cartwise-tools` normalizes what
//! comes back into a `ToolOutput`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use crate::error::ToolError;

/// Catalog entry advertised by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,

    pub description: String,

    /// JSON Schema describing the tool's parameters
    #[serde(default)]
    pub input_schema: Value,
}

/// One payload item inside a raw provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContentItem {
    Text(String),
    Json(Value),
}

impl ContentItem {
    /// The textual rendering of this item.
    pub fn to_text(&self) -> String {
        match self {
            ContentItem::Text(s) => s.clone(),
            ContentItem::Json(v) => v.to_string(),
        }
    }
}

/// The raw, heterogeneous response a provider returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(default)]
    pub content: Vec<ContentItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text(text.into())],
            structured: None,
        }
    }

    pub fn items(items: Vec<ContentItem>) -> Self {
        Self {
            content: items,
            structured: None,
        }
    }

    pub fn structured(value: Value) -> Self {
        Self {
            content: Vec::new(),
            structured: Some(value),
        }
    }
}

/// Normalized tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    List(Vec<String>),
    Structured(Value),
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolOutput::Text(s) => f.write_str(s),
            ToolOutput::List(items) => write!(f, "[{}]", items.join(", ")),
            ToolOutput::Structured(v) => write!(f, "{v}"),
        }
    }
}

/// Outcome of one executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,

    /// The arguments actually sent
    pub arguments: Map<String, Value>,

    pub result: ToolOutput,

    /// Diagnostics only; never inspected by the loop
    #[serde(default)]
    pub raw_response: Value,
}

/// An external source of tools.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> std::result::Result<ToolResponse, ToolError>;
}

/// An in-process tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_product_documents").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, arguments: Map<String, Value>) -> std::result::Result<ToolResponse, ToolError>;

    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// A registry of in-process tools, itself usable as a `ToolProvider`.
///
/// Ordered by name so catalog rendering is stable.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self.tools.values().map(|t| t.to_descriptor()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> std::result::Result<ToolResponse, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(arguments).await
    }
}
