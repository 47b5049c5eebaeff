//! Shared test doubles for the agent stages and loop.

use async_trait::async_trait;
use cartwise_core::error::{LlmError, MemoryError, ToolError};
use cartwise_core::llm::{LanguageModel, extract_json};
use cartwise_core::memory::Embedder;
use cartwise_core::tool::{ToolDescriptor, ToolProvider, ToolResponse};
use cartwise_providers::HashEmbedder;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Json(Value),
    Fail(LlmError),
}

/// A model that returns a sequence of scripted replies.
///
/// Each call to `generate` or `generate_structured` consumes the next reply.
/// Panics if more calls are made than replies provided.
pub struct SequentialMockModel {
    replies: Mutex<Vec<Reply>>,
    call_count: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
}

impl SequentialMockModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            call_count: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Every prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next(&self, prompt: &str) -> Reply {
        let mut count = self.call_count.lock().unwrap();
        let replies = self.replies.lock().unwrap();

        if *count >= replies.len() {
            panic!(
                "SequentialMockModel: no more replies (call #{}, have {})",
                *count,
                replies.len()
            );
        }

        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = replies[*count].clone();
        *count += 1;
        reply
    }
}

#[async_trait]
impl LanguageModel for SequentialMockModel {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        match self.next(prompt) {
            Reply::Text(t) => Ok(t),
            Reply::Json(v) => Ok(v.to_string()),
            Reply::Fail(e) => Err(e),
        }
    }

    async fn generate_structured(&self, prompt: &str, _schema: &Value) -> Result<Value, LlmError> {
        match self.next(prompt) {
            Reply::Text(t) => extract_json(&t),
            Reply::Json(v) => Ok(v),
            Reply::Fail(e) => Err(e),
        }
    }
}

/// Perception reply with the given intent.
pub fn perception(user_input: &str, intent: &str) -> Reply {
    Reply::Json(json!({
        "user_input": user_input,
        "intent": intent,
        "entities": [],
        "tool_hint": "search_product_documents"
    }))
}

/// Structured tool_call decision.
pub fn tool_call(name: &str, input: Value) -> Reply {
    Reply::Json(json!({
        "thought": format!("call {name}"),
        "decision_type": "tool_call",
        "tool_name": name,
        "tool_input": input
    }))
}

/// Structured final_answer decision.
pub fn final_answer(answer: &str) -> Reply {
    Reply::Json(json!({
        "thought": "done",
        "decision_type": "final_answer",
        "final_answer": answer
    }))
}

/// A tool provider that returns scripted responses per tool and records calls.
pub struct ScriptedTools {
    descriptors: Vec<ToolDescriptor>,
    responses: HashMap<String, Result<ToolResponse, ToolError>>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
    list_count: AtomicUsize,
}

impl ScriptedTools {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            list_count: AtomicUsize::new(0),
        }
    }

    /// Register `name`, answering every call with `response`.
    pub fn with_tool(mut self, name: &str, response: Result<ToolResponse, ToolError>) -> Self {
        self.descriptors.push(ToolDescriptor {
            name: name.to_string(),
            description: format!("{name} (scripted)"),
            input_schema: json!({"type": "object"}),
        });
        self.responses.insert(name.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolProvider for ScriptedTools {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        self.list_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.descriptors.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResponse, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        self.responses
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(ToolError::UnknownTool(name.to_string())))
    }
}

/// A deterministic embedder that counts calls.
pub struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashEmbedder::new(64),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }
}

/// Arguments literal.
pub fn args(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}
