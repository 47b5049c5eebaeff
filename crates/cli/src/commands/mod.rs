//! CLI subcommands and the wiring they share.

pub mod agent;
pub mod config_cmd;
pub mod memory;
pub mod parse;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use cartwise_config::AppConfig;
use cartwise_core::memory::Embedder;
use cartwise_core::tool::ToolProvider;
use cartwise_memory::VectorMemory;
use cartwise_providers::DeadlineTools;
use cartwise_tools::{Product, ProductCatalog, default_registry};
use tracing::info;

/// Sample catalog used when none is configured.
const BUNDLED_CATALOG: &str = include_str!("../../data/products.json");

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// The shared vector memory, persisted under the memory dir unless disabled.
pub(crate) fn open_memory(config: &AppConfig, embedder: Arc<dyn Embedder>) -> Arc<VectorMemory> {
    let memory = if config.memory.persist {
        VectorMemory::open(config.memory_dir(), embedder)
    } else {
        VectorMemory::new(embedder)
    };
    Arc::new(memory.with_overfetch(config.memory.overfetch))
}

/// The configured product catalog, then `~/.cartwise/products.json`, then
/// the bundled sample.
pub(crate) fn load_catalog(
    config: &AppConfig,
) -> Result<Arc<ProductCatalog>, Box<dyn std::error::Error>> {
    if let Some(path) = &config.tools.catalog_path {
        return Ok(Arc::new(ProductCatalog::load(path)?));
    }
    let user_catalog = AppConfig::config_dir().join("products.json");
    if user_catalog.exists() {
        return Ok(Arc::new(ProductCatalog::load(&user_catalog)?));
    }
    let products: Vec<Product> = serde_json::from_str(BUNDLED_CATALOG)?;
    info!(count = products.len(), "Using bundled sample catalog");
    Ok(Arc::new(ProductCatalog::new(products)))
}

/// The local tool provider, each call bounded by `tools.timeout_secs`.
pub(crate) fn tool_provider(
    config: &AppConfig,
    catalog: Arc<ProductCatalog>,
    embedder: Arc<dyn Embedder>,
) -> Arc<dyn ToolProvider> {
    let registry = Arc::new(default_registry(catalog, embedder));
    Arc::new(DeadlineTools::new(
        registry,
        Duration::from_secs(config.tools.timeout_secs),
    ))
}
