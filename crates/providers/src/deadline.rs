//! Wall-clock deadlines for collaborator calls.
//!
//! `DeadlineModel`, `DeadlineTools` and `DeadlineEmbedder` wrap a model, a
//! tool provider or an embedder and race each call against
//! `tokio::time::timeout`. Expiry surfaces as the collaborator's ordinary
//! error type, so the loop handles it like any other failure.

use async_trait::async_trait;
use cartwise_core::error::{LlmError, MemoryError, ToolError};
use cartwise_core::llm::LanguageModel;
use cartwise_core::memory::Embedder;
use cartwise_core::tool::{ToolDescriptor, ToolProvider, ToolResponse};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A model whose every call is bounded by `timeout`.
pub struct DeadlineModel {
    inner: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl DeadlineModel {
    pub fn new(inner: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn expired(&self, operation: &str) -> LlmError {
        warn!(
            model = %self.inner.name(),
            operation,
            timeout_secs = self.timeout.as_secs(),
            "Model call timed out"
        );
        LlmError::Timeout(format!(
            "Model '{}' timed out after {}s",
            self.inner.name(),
            self.timeout.as_secs()
        ))
    }
}

#[async_trait]
impl LanguageModel for DeadlineModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        tokio::time::timeout(self.timeout, self.inner.generate(prompt))
            .await
            .map_err(|_| self.expired("generate"))?
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<Value, LlmError> {
        tokio::time::timeout(self.timeout, self.inner.generate_structured(prompt, schema))
            .await
            .map_err(|_| self.expired("generate_structured"))?
    }
}

/// A tool provider whose listing and calls are bounded by `timeout`.
pub struct DeadlineTools {
    inner: Arc<dyn ToolProvider>,
    timeout: Duration,
}

impl DeadlineTools {
    pub fn new(inner: Arc<dyn ToolProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn expired(&self, tool_name: &str) -> ToolError {
        warn!(
            tool = tool_name,
            timeout_secs = self.timeout.as_secs(),
            "Tool call timed out"
        );
        ToolError::Timeout {
            tool_name: tool_name.to_string(),
            timeout_secs: self.timeout.as_secs(),
        }
    }
}

#[async_trait]
impl ToolProvider for DeadlineTools {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        tokio::time::timeout(self.timeout, self.inner.list_tools())
            .await
            .map_err(|_| self.expired("list_tools"))?
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResponse, ToolError> {
        tokio::time::timeout(self.timeout, self.inner.call_tool(name, arguments))
            .await
            .map_err(|_| self.expired(name))?
    }
}

/// An embedder whose every call is bounded by `timeout`.
pub struct DeadlineEmbedder {
    inner: Arc<dyn Embedder>,
    timeout: Duration,
}

impl DeadlineEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Embedder for DeadlineEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        tokio::time::timeout(self.timeout, self.inner.embed(text))
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Embedding call timed out");
                MemoryError::EmbeddingFailed(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowModel(Duration);

    #[async_trait]
    impl LanguageModel for SlowModel {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            tokio::time::sleep(self.0).await;
            Ok("{\"ok\": true}".into())
        }
    }

    struct SlowTools(Duration);

    #[async_trait]
    impl ToolProvider for SlowTools {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: Map<String, Value>,
        ) -> Result<ToolResponse, ToolError> {
            tokio::time::sleep(self.0).await;
            Ok(ToolResponse::text("done"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let model = DeadlineModel::new(
            Arc::new(SlowModel(Duration::from_secs(30))),
            Duration::from_secs(5),
        );
        let err = model.generate("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(ref m) if m.contains("after 5s")));

        let err = model
            .generate_structured("hi", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_model_passes_through() {
        let model = DeadlineModel::new(
            Arc::new(SlowModel(Duration::from_secs(1))),
            Duration::from_secs(5),
        );
        assert_eq!(model.name(), "slow");
        let value = model
            .generate_structured("hi", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let tools = DeadlineTools::new(
            Arc::new(SlowTools(Duration::from_secs(60))),
            Duration::from_secs(10),
        );
        let err = tools.call_tool("search", Map::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::Timeout { ref tool_name, timeout_secs: 10 } if tool_name == "search"
        ));
        assert!(tools.list_tools().await.unwrap().is_empty());
    }

    struct SlowEmbedder(Duration);

    #[async_trait]
    impl Embedder for SlowEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, MemoryError> {
            tokio::time::sleep(self.0).await;
            Ok(vec![0.0; 3])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_embedder_times_out() {
        let slow = DeadlineEmbedder::new(
            Arc::new(SlowEmbedder(Duration::from_secs(60))),
            Duration::from_secs(5),
        );
        assert_eq!(slow.dimensions(), 3);
        let err = slow.embed("green shoes").await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingFailed(ref m) if m.contains("after 5s")));

        let fast = DeadlineEmbedder::new(
            Arc::new(SlowEmbedder(Duration::from_secs(1))),
            Duration::from_secs(5),
        );
        assert_eq!(fast.embed("green shoes").await.unwrap().len(), 3);
    }
}
