//! Tools for Cartwise.
//!
//! The gateway the agent loop calls through, the product catalog, and the
//! built-in tools served in process by a [`ToolRegistry`]: catalog search,
//! refinement hints, reranking, the finalizing pretty-printer, and two small
//! math tools.

pub mod catalog;
pub mod gateway;
pub mod math;
pub mod products;

use cartwise_core::memory::Embedder;
use cartwise_core::tool::ToolRegistry;
use std::sync::Arc;

pub use catalog::{CatalogError, Product, ProductCatalog};
pub use gateway::{ToolGateway, normalize};
pub use products::{METADATA_TOOL, PRETTY_PRINT_TOOL, RERANK_TOOL, SEARCH_TOOL};

/// After this tool runs the next decision must be a final answer.
pub const FINALIZING_TOOL: &str = PRETTY_PRINT_TOOL;

/// Create the local tool provider with every built-in tool.
pub fn default_registry(catalog: Arc<ProductCatalog>, embedder: Arc<dyn Embedder>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(products::SearchProductsTool::new(catalog, embedder)));
    registry.register(Box::new(products::MetadataAnalysisTool));
    registry.register(Box::new(products::RerankTool));
    registry.register(Box::new(products::PrettyPrintTool));
    registry.register(Box::new(math::AddTool));
    registry.register(Box::new(math::SumListTool));
    registry
}
