//! `cartwise config`: configuration management commands.

use cartwise_config::{AppConfig, EmbedderKind};
use cartwise_providers::is_local;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed and validated");

            let mut warnings = Vec::new();

            if !config.has_api_key() && !is_local(&config.llm.provider) {
                warnings.push(
                    "No API key set (set CARTWISE_API_KEY, OPENAI_API_KEY or OPENROUTER_API_KEY)"
                        .to_string(),
                );
            }

            if let Some(path) = &config.tools.catalog_path {
                if !path.exists() {
                    warnings.push(format!("Catalog file not found: {}", path.display()));
                }
            }

            if config.memory.embedder == EmbedderKind::Remote && !config.memory.persist {
                warnings.push(
                    "Remote embeddings without persistence re-embed memory every run".to_string(),
                );
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Provider:   {}", config.llm.provider);
            println!("   Model:      {}", config.llm.model);
            println!("   Max steps:  {}", config.agent.max_steps);
            println!("   Top k:      {}", config.agent.top_k);
            println!("   Memory:     {}", config.memory_dir().display());
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    println!("{}", render(&config)?);
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_path();
    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        println!("   Run with --force to overwrite it.");
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

/// The config as TOML with the API key masked.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("***".into());
    }
    toml::to_string_pretty(&shown)
}
