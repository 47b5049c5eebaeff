//! `cartwise agent`: single-query or interactive mode.

use std::io::Write;
use std::sync::Arc;

use cartwise_agent::{AgentLoop, ConversationHistory, StdinConfirmer};
use cartwise_config::AppConfig;
use cartwise_core::error::LlmError;
use cartwise_providers::build_from_config;

pub async fn run(
    message: Option<String>,
    session: Option<String>,
    max_steps: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Check for a usable model early and give a clear error
    let collaborators = match build_from_config(&config) {
        Ok(c) => c,
        Err(LlmError::NotConfigured(reason)) => {
            eprintln!();
            eprintln!("  ERROR: {reason}");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    CARTWISE_API_KEY    = 'sk-...'       (generic)");
            eprintln!("    OPENAI_API_KEY      = 'sk-...'       (OpenAI direct)");
            eprintln!("    OPENROUTER_API_KEY  = 'sk-or-v1-...' (OpenRouter)");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_path().display());
            eprintln!();
            return Err("No API key found. See above for setup instructions.".into());
        }
        Err(e) => return Err(e.into()),
    };

    let memory = super::open_memory(&config, collaborators.embedder.clone());
    let catalog = super::load_catalog(&config)?;
    let product_count = catalog.len();
    let tools = super::tool_provider(&config, catalog, collaborators.embedder.clone());

    let mut agent = AgentLoop::new(collaborators.model.clone(), memory.clone(), tools)
        .with_max_steps(max_steps.unwrap_or(config.agent.max_steps))
        .with_top_k(config.agent.top_k)
        .with_decision_mode(config.agent.decision_mode.into())
        .with_finalizing_tool(config.tools.finalizing_tool.clone())
        .with_user_id(config.agent.user_id.clone())
        .with_confirmer(Arc::new(StdinConfirmer));
    if config.agent.history {
        agent = agent.with_history(ConversationHistory::new(
            memory.clone(),
            collaborators.model.clone(),
        ));
    }

    let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Some(msg) = message {
        // Single query mode
        eprint!("  Searching...");
        let outcome = agent.run(&msg, &session).await?;
        eprint!("\r              \r");
        println!("{}", outcome.final_answer);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Cartwise Agent (interactive)");
    println!();
    println!("  Provider:  {}", config.llm.provider);
    println!("  Model:     {}", config.llm.model);
    println!("  Catalog:   {product_count} products");
    println!("  Memory:    {} records", memory.len().await);
    println!("  Session:   {session}");
    println!();
    println!("  Type your request and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    loop {
        let Some(line) = read_line("  You > ").await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        match agent.run(input, &session).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                println!();
                for line in outcome.final_answer.lines() {
                    println!("  Cartwise > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Prompt and read one line; `None` at end of input.
async fn read_line(prompt: &'static str) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let line = tokio::task::spawn_blocking(move || {
        let mut stdout = std::io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        let mut line = String::new();
        let read = std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>((read > 0).then_some(line))
    })
    .await??;
    Ok(line)
}
