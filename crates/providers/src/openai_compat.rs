//! OpenAI-compatible model and embedding client.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, llama.cpp, and any
//! endpoint exposing `/chat/completions` and `/embeddings`.
//!
//! Supports:
//! - Free-text completions (`LanguageModel::generate`)
//! - Schema-constrained JSON (`response_format`) with a prompt-only fallback
//! - Embeddings (`Embedder::embed`)

use async_trait::async_trait;
use cartwise_core::error::{LlmError, MemoryError};
use cartwise_core::llm::{LanguageModel, extract_json};
use cartwise_core::memory::Embedder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default dimensions of `text-embedding-3-small`.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// An OpenAI-compatible client.
///
/// One instance serves both seams: it is the `LanguageModel` for perception,
/// decision and summarization, and the remote `Embedder` when configured.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    embedding_dimensions: usize,
    temperature: f32,
    native_structured: bool,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client for the endpoint at `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            temperature: 0.2,
            native_structured: true,
            client,
        })
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an OpenRouter client (convenience constructor).
    pub fn openrouter(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an Ollama client (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )?
        .with_native_structured(false))
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.embedding_model = model.into();
        self.embedding_dimensions = dimensions;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Whether to send `response_format` for structured generation.
    pub fn with_native_structured(mut self, enabled: bool) -> Self {
        self.native_structured = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(LlmError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(LlmError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(LlmError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    async fn chat(&self, prompt: &str, response_format: Option<Value>) -> Result<String, LlmError> {
        let request = ApiChatRequest {
            model: &self.model,
            messages: vec![ApiMessage {
                role: "user".into(),
                content: Some(prompt.to_string()),
            }],
            temperature: self.temperature,
            stream: false,
            response_format,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| LlmError::InvalidOutput(format!("Failed to encode request: {e}")))?;

        debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let api_response: ApiResponse =
            self.post("/chat/completions", &body)
                .await?
                .json()
                .await
                .map_err(|e| LlmError::ApiError {
                    status_code: 200,
                    message: format!("Failed to parse response: {e}"),
                })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.chat(prompt, None).await
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<Value, LlmError> {
        // The schema goes in the prompt either way; json_object mode requires
        // the word "JSON" to appear in the messages.
        let prompt = format!(
            "{prompt}\n\nRespond with a single JSON object matching this JSON Schema and nothing else:\n{schema}"
        );
        let format = self
            .native_structured
            .then(|| serde_json::json!({ "type": "json_object" }));
        let text = self.chat(&prompt, format).await?;
        extract_json(&text)
    }
}

#[async_trait]
impl Embedder for OpenAiCompatClient {
    fn dimensions(&self) -> usize {
        self.embedding_dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": [text],
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %self.embedding_model,
            "Sending embedding request"
        );

        let response = self
            .post("/embeddings", &body)
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        let api_resp: EmbeddingApiResponse = response.json().await.map_err(|e| {
            MemoryError::EmbeddingFailed(format!("Failed to parse embedding response: {e}"))
        })?;

        api_resp
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| MemoryError::EmbeddingFailed("No embedding in response".into()))
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openrouter_constructor() {
        let client = OpenAiCompatClient::openrouter("sk-test", "openai/gpt-4o-mini").unwrap();
        assert_eq!(client.name(), "openrouter");
        assert!(client.base_url().contains("openrouter.ai"));
        assert_eq!(client.model(), "openai/gpt-4o-mini");
    }

    #[test]
    fn ollama_constructor() {
        let client = OpenAiCompatClient::ollama(None, "llama3").unwrap();
        assert_eq!(client.name(), "ollama");
        assert!(client.base_url().contains("localhost:11434"));
        assert!(!client.native_structured);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = OpenAiCompatClient::new("x", "http://localhost:8080/v1/", "k", "m").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn embedding_dimensions_are_configurable() {
        let client = OpenAiCompatClient::openai("sk", "gpt-4o-mini")
            .unwrap()
            .with_embedding_model("text-embedding-3-large", 3072);
        assert_eq!(client.dimensions(), 3072);
    }

    #[test]
    fn request_omits_absent_response_format() {
        let request = ApiChatRequest {
            model: "m",
            messages: vec![ApiMessage {
                role: "user".into(),
                content: Some("hi".into()),
            }],
            temperature: 0.0,
            stream: false,
            response_format: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn parse_chat_response() {
        let data = r#"{"id":"x","model":"m","choices":[{"index":0,"message":{"role":"assistant","content":"FINAL_ANSWER: done"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("FINAL_ANSWER: done")
        );
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{"object":"list","model":"e","data":[{"index":0,"embedding":[0.1,0.2]}]}"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let client = OpenAiCompatClient::new("dead", "http://127.0.0.1:9", "k", "m").unwrap();
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Network(_) | LlmError::Timeout(_)));
    }
}
