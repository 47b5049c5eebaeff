//! Product tools: catalog search, refinement hints, reranking and the
//! finalizing pretty-printer.

use async_trait::async_trait;
use cartwise_core::error::ToolError;
use cartwise_core::memory::Embedder;
use cartwise_core::tool::{Tool, ToolResponse};
use cartwise_memory::nearest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};
use crate::catalog::ProductCatalog;

pub const SEARCH_TOOL: &str = "search_product_documents";
pub const METADATA_TOOL: &str = "product_metadata_analysis_for_refine_or_tuning_search_result";
pub const RERANK_TOOL: &str = "return_ranked_product_response_from_ranked_index";
pub const PRETTY_PRINT_TOOL: &str = "preety_print_product_metadata_response";

const DEFAULT_TOP_K: u64 = 5;

/// Semantic search over the product catalog.
pub struct SearchProductsTool {
    catalog: Arc<ProductCatalog>,
    embedder: Arc<dyn Embedder>,
}

impl SearchProductsTool {
    pub fn new(catalog: Arc<ProductCatalog>, embedder: Arc<dyn Embedder>) -> Self {
        Self { catalog, embedder }
    }
}

#[async_trait]
impl Tool for SearchProductsTool {
    fn name(&self) -> &str {
        SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the product catalog for products relevant to the query. Returns up to top_k products, best match first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What the user is looking for, e.g. 'green casual shoes for men'"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of products to return (default 5)",
                    "default": DEFAULT_TOP_K
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolResponse, ToolError> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let top_k = arguments
            .get("top_k")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TOP_K) as usize;

        info!(query, top_k, "Searching products");
        if self.catalog.is_empty() || top_k == 0 {
            return Ok(ToolResponse::structured(json!([])));
        }

        let failed = |e: cartwise_core::error::MemoryError| ToolError::ExecutionFailed {
            tool_name: SEARCH_TOOL.into(),
            reason: e.to_string(),
        };
        let vectors = self.catalog.vectors(self.embedder.as_ref()).await.map_err(failed)?;
        let query_vector = self.embedder.embed(query).await.map_err(failed)?;

        let products = self.catalog.products();
        let ranked: Vec<Value> = nearest(vectors, &query_vector, top_k)
            .into_iter()
            .filter_map(|(i, _)| serde_json::to_value(&products[i]).ok())
            .collect();

        debug!(returned = ranked.len(), "Product search done");
        Ok(ToolResponse::structured(Value::Array(ranked)))
    }
}

/// Attribute groups the model can use to refine or rerank results.
pub struct MetadataAnalysisTool;

#[async_trait]
impl Tool for MetadataAnalysisTool {
    fn name(&self) -> &str {
        METADATA_TOOL
    }

    fn description(&self) -> &str {
        "List the product attributes usable to refine, tune or rerank search results \
         (e.g. brand, gender, price, article_type, usage) when the search does not match exactly."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Map<String, Value>) -> Result<ToolResponse, ToolError> {
        Ok(ToolResponse::structured(json!({
            "article_attributes": [
                "Ankle Height", "Arch Type", "Closure", "Collar", "Colour Family",
                "Cushioning", "Fabric", "Fit", "Length", "Neck", "Occasion",
                "Pattern", "Sleeve Length", "Sole Material", "Type", "Waist Rise"
            ],
            "master_category": ["typeName"],
            "sub_category": ["typeName"],
            "article_type": ["typeName"],
            "product_descriptors": ["description"],
            "metadata": [
                "id", "name", "brand", "article_type", "base_colour",
                "gender", "usage", "price"
            ]
        })))
    }
}

/// Reorder products by model-chosen indices.
pub struct RerankTool;

#[async_trait]
impl Tool for RerankTool {
    fn name(&self) -> &str {
        RERANK_TOOL
    }

    fn description(&self) -> &str {
        "Reorder a list of products by a ranking of their indices. \
         With products [A, B, C] and ranked_indices [2, 0] the result is [C, A]."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "product_responses": {
                    "type": "array",
                    "description": "The products returned by a previous search"
                },
                "ranked_indices": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Zero-based indices into product_responses, best first"
                }
            },
            "required": ["product_responses", "ranked_indices"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolResponse, ToolError> {
        let products = as_array(arguments.get("product_responses"), "product_responses")?;
        let indices = as_array(arguments.get("ranked_indices"), "ranked_indices")?;

        let mut ranked = Vec::with_capacity(indices.len());
        for index in &indices {
            let i = index
                .as_u64()
                .map(|i| i as usize)
                .filter(|i| *i < products.len())
                .ok_or_else(|| {
                    ToolError::InvalidArguments(format!(
                        "ranked index {index} out of range for {} products",
                        products.len()
                    ))
                })?;
            ranked.push(products[i].clone());
        }
        Ok(ToolResponse::structured(Value::Array(ranked)))
    }
}

/// The subset of product fields shown to the user.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProductSummary {
    #[serde(default)]
    name: String,
    #[serde(default)]
    brand: String,
    #[serde(default)]
    article_type: String,
    #[serde(default)]
    base_colour: String,
    #[serde(default)]
    gender: String,
    #[serde(default)]
    usage: String,
    #[serde(default)]
    price: f64,
}

/// Render products as readable metadata. Running it means the answer is ready.
pub struct PrettyPrintTool;

#[async_trait]
impl Tool for PrettyPrintTool {
    fn name(&self) -> &str {
        PRETTY_PRINT_TOOL
    }

    fn description(&self) -> &str {
        "Pretty print the metadata of the selected products for the final answer. \
         Accepts a JSON string, a list of products, or a list of JSON strings. \
         Call this last, then give the final answer."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "product_response_list": {
                    "description": "Products to print: a JSON string, a list of product objects, or a list of JSON strings"
                }
            },
            "required": ["product_response_list"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolResponse, ToolError> {
        let input = arguments.get("product_response_list").ok_or_else(|| {
            ToolError::InvalidArguments("Missing 'product_response_list' argument".into())
        })?;

        let mut rendered = Vec::new();
        for item in flatten_products(input)? {
            let summary: ProductSummary = serde_json::from_value(item).map_err(|e| {
                ToolError::InvalidArguments(format!("not a product: {e}"))
            })?;
            rendered.push(serde_json::to_string_pretty(&summary).map_err(|e| {
                ToolError::ExecutionFailed {
                    tool_name: PRETTY_PRINT_TOOL.into(),
                    reason: e.to_string(),
                }
            })?);
        }
        Ok(ToolResponse::text(rendered.join("\n\n")))
    }
}

/// Product objects from any of the accepted input shapes.
fn flatten_products(input: &Value) -> Result<Vec<Value>, ToolError> {
    match input {
        Value::String(s) => match parse_lenient(s)? {
            Value::Array(items) => Ok(items),
            other => Ok(vec![other]),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => parse_lenient(s),
                other => Ok(other.clone()),
            })
            .collect(),
        Value::Object(_) => Ok(vec![input.clone()]),
        other => Err(ToolError::InvalidArguments(format!(
            "expected products, got {other}"
        ))),
    }
}

/// JSON, retried once with over-escaped quotes and backslashes undone.
fn parse_lenient(s: &str) -> Result<Value, ToolError> {
    serde_json::from_str(s).or_else(|_| {
        let cleaned = s
            .replace("\\'", "'")
            .replace("\\\"", "\"")
            .replace("\\\\", "\\");
        serde_json::from_str(&cleaned)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid product JSON: {e}")))
    })
}

/// An array argument, also accepted as a JSON string holding one.
fn as_array(value: Option<&Value>, name: &str) -> Result<Vec<Value>, ToolError> {
    match value {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::String(s)) => match parse_lenient(s)? {
            Value::Array(items) => Ok(items),
            _ => Err(ToolError::InvalidArguments(format!("'{name}' must be a list"))),
        },
        Some(_) => Err(ToolError::InvalidArguments(format!("'{name}' must be a list"))),
        None => Err(ToolError::InvalidArguments(format!("Missing '{name}' argument"))),
    }
}
