//! `cartwise tools`: list the tool catalog.

use cartwise_providers::build_embedder;
use cartwise_tools::ToolGateway;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let embedder = build_embedder(&config)?;
    let catalog = super::load_catalog(&config)?;
    let products = catalog.len();

    let gateway = ToolGateway::connect(super::tool_provider(&config, catalog, embedder)).await?;

    println!("Available tools ({}):", gateway.catalog().len());
    println!("{}", gateway.describe());
    println!();
    println!("Finalizing tool: {}", config.tools.finalizing_tool);
    println!("Catalog:         {products} products");
    Ok(())
}
