//! `cartwise memory`: memory management commands.

use std::collections::BTreeMap;

use cartwise_config::{AppConfig, EmbedderKind};
use cartwise_core::memory::RetrieveFilter;
use cartwise_memory::VectorMemory;
use cartwise_providers::build_embedder;

fn open(config: &AppConfig) -> Result<std::sync::Arc<VectorMemory>, Box<dyn std::error::Error>> {
    let embedder = build_embedder(config)?;
    Ok(super::open_memory(config, embedder))
}

pub async fn stats() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let memory = open(&config)?;
    let records = memory.records().await;

    println!("Memory Statistics");
    println!("=================");
    if config.memory.persist {
        println!("  Directory:  {}", config.memory_dir().display());
    } else {
        println!("  Directory:  (persistence disabled)");
    }
    match config.memory.embedder {
        EmbedderKind::Hash => println!("  Embedder:   hash ({} dims)", config.memory.hash_dimensions),
        EmbedderKind::Remote => println!("  Embedder:   remote ({})", config.llm.embedding_model),
    }
    println!("  Overfetch:  {}x", memory.overfetch());
    println!("  Records:    {}", records.len());

    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for record in &records {
        *by_kind.entry(record.kind.as_str()).or_default() += 1;
    }
    for (kind, count) in &by_kind {
        println!("    {kind:<22} {count}");
    }

    let mut sessions: Vec<&str> = records
        .iter()
        .filter_map(|r| r.session_id.as_deref())
        .collect();
    sessions.sort_unstable();
    sessions.dedup();
    println!("  Sessions:   {}", sessions.len());

    Ok(())
}

pub async fn search(
    query: &str,
    limit: usize,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let memory = open(&config)?;

    println!("Searching memories for: \"{query}\"");
    println!();

    let filter = session.map(RetrieveFilter::session).unwrap_or_default();
    let results = memory.search_scored(query, limit, &filter).await?;
    if results.is_empty() {
        println!("   No memories found.");
        return Ok(());
    }

    for (i, (record, distance)) in results.iter().enumerate() {
        println!(
            "  {i:>2}. [dist: {distance:.3}] [{}] {}",
            record.kind,
            preview(&record.text, 80)
        );
        if !record.tags.is_empty() {
            println!("      tags: {}", record.tags.join(", "));
        }
    }

    Ok(())
}

pub async fn clear(confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("This will delete ALL memories permanently.");
        println!("   Run with --confirm to proceed:");
        println!("   cartwise memory clear --confirm");
        return Ok(());
    }

    let config = super::load_config()?;
    let memory = open(&config)?;
    let count = memory.len().await;
    memory.clear().await?;
    println!("Cleared {count} memories.");

    Ok(())
}

/// First `max` characters on one line.
fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut out: String = flat.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("User: hi\nAI: hello", 80), "User: hi AI: hello");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }
}
