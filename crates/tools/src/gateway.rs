//! Tool gateway: the loop's single door to a tool provider.
//!
//! `connect` fetches the catalog once; the gateway then holds it for the
//! run and is dropped with it. `execute` checks names against that catalog,
//! forwards the call, and normalizes whatever the provider returns into a
//! `ToolOutput`.

use cartwise_core::error::ToolError;
use cartwise_core::tool::{
    ContentItem, ToolCallResult, ToolDescriptor, ToolOutput, ToolProvider, ToolResponse,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct ToolGateway {
    provider: Arc<dyn ToolProvider>,
    catalog: Vec<ToolDescriptor>,
}

impl ToolGateway {
    /// Acquire the catalog handle from `provider`.
    pub async fn connect(provider: Arc<dyn ToolProvider>) -> Result<Self, ToolError> {
        let catalog = provider.list_tools().await?;
        debug!(tools = catalog.len(), "Tool catalog acquired");
        Ok(Self { provider, catalog })
    }

    pub fn catalog(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.catalog.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.catalog.iter().any(|t| t.name == name)
    }

    /// The catalog as `- name: description` lines, for prompts.
    pub fn describe(&self) -> String {
        self.catalog
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run one tool and normalize its response.
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        if !self.has_tool(tool_name) {
            warn!(tool = tool_name, "Unknown tool requested");
            return Err(ToolError::UnknownTool(tool_name.to_string()));
        }

        let start = Instant::now();
        let response = self
            .provider
            .call_tool(tool_name, arguments.clone())
            .await
            .map_err(|e| match e {
                ToolError::Timeout { .. } | ToolError::ExecutionFailed { .. } => e,
                other => ToolError::ExecutionFailed {
                    tool_name: tool_name.to_string(),
                    reason: other.to_string(),
                },
            })?;

        info!(
            tool = tool_name,
            duration_ms = start.elapsed().as_millis() as u64,
            "Tool executed"
        );

        let raw_response = serde_json::to_value(&response).unwrap_or(Value::Null);
        Ok(ToolCallResult {
            tool_name: tool_name.to_string(),
            arguments,
            result: normalize(response),
            raw_response,
        })
    }
}

/// Map any provider response onto a `ToolOutput`.
///
/// Several content items become a list of their texts; a single text item
/// is returned as is; a structured payload is kept structured. Anything else
/// is stringified.
pub fn normalize(response: ToolResponse) -> ToolOutput {
    let ToolResponse {
        mut content,
        structured,
    } = response;

    if content.len() > 1 {
        return ToolOutput::List(content.iter().map(ContentItem::to_text).collect());
    }
    if let [ContentItem::Text(_)] = content.as_slice() {
        if let Some(ContentItem::Text(text)) = content.pop() {
            return ToolOutput::Text(text);
        }
    }
    if let Some(value) = structured {
        return ToolOutput::Structured(value);
    }
    match content.pop() {
        Some(item) => ToolOutput::Text(item.to_text()),
        None => ToolOutput::Text(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cartwise_core::tool::ToolRegistry;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a canned response per tool and records calls.
    struct CannedProvider {
        responses: Vec<(String, Result<ToolResponse, ToolError>)>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn new(responses: Vec<(&str, Result<ToolResponse, ToolError>)>) -> Arc<Self> {
            Arc::new(Self {
                responses: responses
                    .into_iter()
                    .map(|(n, r)| (n.to_string(), r))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ToolProvider for CannedProvider {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
            Ok(self
                .responses
                .iter()
                .map(|(name, _)| ToolDescriptor {
                    name: name.clone(),
                    description: format!("{name} tool"),
                    input_schema: json!({"type": "object"}),
                })
                .collect())
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: Map<String, Value>,
        ) -> Result<ToolResponse, ToolError> {
            self.calls.lock().unwrap().push(name.to_string());
            self.responses
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, r)| r.clone())
                .unwrap_or_else(|| Err(ToolError::UnknownTool(name.to_string())))
        }
    }

    #[test]
    fn normalization_table() {
        let cases = vec![
            (
                ToolResponse::items(vec![
                    ContentItem::Text("Green Shoe A".into()),
                    ContentItem::Text("Green Shoe B".into()),
                ]),
                ToolOutput::List(vec!["Green Shoe A".into(), "Green Shoe B".into()]),
            ),
            (
                ToolResponse::items(vec![
                    ContentItem::Text("a".into()),
                    ContentItem::Json(json!({"b": 1})),
                ]),
                ToolOutput::List(vec!["a".into(), "{\"b\":1}".into()]),
            ),
            (ToolResponse::text("done"), ToolOutput::Text("done".into())),
            (
                ToolResponse::structured(json!([1, 2])),
                ToolOutput::Structured(json!([1, 2])),
            ),
            (
                ToolResponse::items(vec![ContentItem::Json(json!({"x": true}))]),
                ToolOutput::Text("{\"x\":true}".into()),
            ),
            (ToolResponse::default(), ToolOutput::Text(String::new())),
        ];
        for (response, expected) in cases {
            assert_eq!(normalize(response), expected);
        }
    }

    #[test]
    fn list_output_displays_bracketed() {
        let out = normalize(ToolResponse::items(vec![
            ContentItem::Text("Green Shoe A".into()),
            ContentItem::Text("Green Shoe B".into()),
        ]));
        assert_eq!(out.to_string(), "[Green Shoe A, Green Shoe B]");
    }

    #[tokio::test]
    async fn connect_exposes_catalog() {
        let provider = CannedProvider::new(vec![
            ("search_product_documents", Ok(ToolResponse::text("ok"))),
            ("add", Ok(ToolResponse::text("5"))),
        ]);
        let gateway = ToolGateway::connect(provider).await.unwrap();
        assert_eq!(gateway.tool_names(), vec!["search_product_documents", "add"]);
        assert_eq!(
            gateway.describe(),
            "- search_product_documents: search_product_documents tool\n- add: add tool"
        );
    }

    #[tokio::test]
    async fn execute_returns_call_result() {
        let provider = CannedProvider::new(vec![("add", Ok(ToolResponse::text("5")))]);
        let gateway = ToolGateway::connect(provider.clone()).await.unwrap();

        let args = json!({"input": {"a": 2, "b": 3}}).as_object().cloned().unwrap();
        let result = gateway.execute("add", args.clone()).await.unwrap();
        assert_eq!(result.tool_name, "add");
        assert_eq!(result.arguments, args);
        assert_eq!(result.result, ToolOutput::Text("5".into()));
        assert_eq!(*provider.calls.lock().unwrap(), vec!["add".to_string()]);
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_provider() {
        let provider = CannedProvider::new(vec![("add", Ok(ToolResponse::text("5")))]);
        let gateway = ToolGateway::connect(provider.clone()).await.unwrap();

        let err = gateway.execute("nope", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(ref n) if n == "nope"));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_failures_become_execution_failed() {
        let provider = CannedProvider::new(vec![(
            "add",
            Err(ToolError::InvalidArguments("missing a".into())),
        )]);
        let gateway = ToolGateway::connect(provider).await.unwrap();

        let err = gateway.execute("add", Map::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::ExecutionFailed { ref tool_name, ref reason }
                if tool_name == "add" && reason.contains("missing a")
        ));
    }

    #[tokio::test]
    async fn timeouts_pass_through() {
        let provider = CannedProvider::new(vec![(
            "slow",
            Err(ToolError::Timeout {
                tool_name: "slow".into(),
                timeout_secs: 3,
            }),
        )]);
        let gateway = ToolGateway::connect(provider).await.unwrap();
        let err = gateway.execute("slow", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_secs: 3, .. }));
    }

    #[tokio::test]
    async fn works_over_a_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(crate::math::AddTool));
        let gateway = ToolGateway::connect(Arc::new(registry)).await.unwrap();

        let args = json!({"input": {"a": 1, "b": 1}}).as_object().cloned().unwrap();
        let result = gateway.execute("add", args).await.unwrap();
        assert_eq!(result.result.to_string(), "2");
    }
}
