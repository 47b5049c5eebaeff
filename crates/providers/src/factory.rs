//! Composition root: builds the model and embedder from configuration.

use std::sync::Arc;
use std::time::Duration;
use cartwise_config::{AppConfig, EmbedderKind};
use cartwise_core::error::LlmError;
use cartwise_core::llm::LanguageModel;
use cartwise_core::memory::Embedder;
use tracing::debug;
use crate::deadline::{DeadlineEmbedder, DeadlineModel};
use crate::hash::HashEmbedder;
use crate::openai_compat::{DEFAULT_EMBEDDING_DIMENSIONS, OpenAiCompatClient};

/// The injected collaborators a run needs besides tools.
pub struct Collaborators {
    pub model: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
}

/// Build the model (behind a deadline) and the configured embedder.
pub fn build_from_config(config: &AppConfig) -> Result<Collaborators, LlmError> {
    let client = Arc::new(build_client(config)?);
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let model: Arc<dyn LanguageModel> = Arc::new(DeadlineModel::new(client.clone(), timeout));

    let embedder: Arc<dyn Embedder> = match config.memory.embedder {
        EmbedderKind::Hash => Arc::new(HashEmbedder::new(config.memory.hash_dimensions)),
        EmbedderKind::Remote => Arc::new(DeadlineEmbedder::new(client, timeout)),
    };

    debug!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        embedder = ?config.memory.embedder,
        "Collaborators built"
    );
    Ok(Collaborators { model, embedder })
}

/// The embedder alone, for commands that never call the model.
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, LlmError> {
    Ok(match config.memory.embedder {
        EmbedderKind::Hash => Arc::new(HashEmbedder::new(config.memory.hash_dimensions)),
        EmbedderKind::Remote => Arc::new(DeadlineEmbedder::new(
            Arc::new(build_client(config)?),
            Duration::from_secs(config.llm.timeout_secs),
        )),
    })
}

/// The raw OpenAI-compatible client described by `[llm]`.
pub fn build_client(config: &AppConfig) -> Result<OpenAiCompatClient, LlmError> {
    let llm = &config.llm;
    let api_key = match (&llm.api_key, is_local(&llm.provider)) {
        (Some(key), _) => key.clone(),
        (None, true) => llm.provider.clone(),
        (None, false) => {
            return Err(LlmError::NotConfigured(format!(
                "no API key for provider '{}' (set CARTWISE_API_KEY or llm.api_key)",
                llm.provider
            )));
        }
    };

    let base_url = llm
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(&llm.provider));

    let client = OpenAiCompatClient::new(&llm.provider, base_url, api_key, &llm.model)?
        .with_temperature(llm.temperature)
        .with_embedding_model(&llm.embedding_model, embedding_dimensions(&llm.embedding_model))
        .with_native_structured(!is_local(&llm.provider));
    Ok(client)
}

/// Providers served locally, which need no API key.
pub fn is_local(provider: &str) -> bool {
    matches!(provider, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

fn embedding_dimensions(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        "nomic-embed-text" => 768,
        "mxbai-embed-large" => 1024,
        _ => DEFAULT_EMBEDDING_DIMENSIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn hosted_provider_without_key_is_not_configured() {
        let config = AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(LlmError::NotConfigured(_))
        ));
    }

    #[test]
    fn local_provider_needs_no_key() {
        let mut config = AppConfig::default();
        config.llm.provider = "ollama".into();
        let built = build_from_config(&config).unwrap();
        assert_eq!(built.model.name(), "ollama");
        assert_eq!(built.embedder.dimensions(), config.memory.hash_dimensions);
    }

    #[test]
    fn remote_embedder_uses_model_dimensions() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".into());
        config.memory.embedder = EmbedderKind::Remote;
        config.llm.embedding_model = "text-embedding-3-large".into();
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dimensions(), 3072);
    }

    #[test]
    fn hash_embedder_needs_no_client() {
        let config = AppConfig::default();
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dimensions(), 256);
    }

    #[test]
    fn configured_base_url_wins() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk".into());
        config.llm.base_url = Some("http://proxy.local/v1".into());
        let client = build_client(&config).unwrap();
        assert_eq!(client.base_url(), "http://proxy.local/v1");
    }
}
