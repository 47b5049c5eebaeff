//! Cross-session conversation history, kept in the shared vector memory.

use cartwise_core::error::MemoryError;
use cartwise_core::llm::LanguageModel;
use cartwise_core::memory::{MemoryRecord, MemoryType, RetrieveFilter};
use cartwise_memory::VectorMemory;
use std::sync::Arc;
use tracing::{debug, warn};

/// Interactions longer than this are summarized before storage.
pub const SUMMARY_THRESHOLD: usize = 10_000;

/// Default number of past interactions pulled into context.
pub const DEFAULT_HISTORY_TOP_K: usize = 2;

pub struct ConversationHistory {
    memory: Arc<VectorMemory>,
    model: Arc<dyn LanguageModel>,
    threshold: usize,
}

impl ConversationHistory {
    pub fn new(memory: Arc<VectorMemory>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            memory,
            model,
            threshold: SUMMARY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, chars: usize) -> Self {
        self.threshold = chars;
        self
    }

    /// Store one user/agent exchange, summarizing it first if it is long.
    pub async fn add_interaction(
        &self,
        user_id: Option<&str>,
        session_id: &str,
        user_msg: &str,
        agent_msg: &str,
    ) -> Result<String, MemoryError> {
        let interaction = format!("User: {user_msg}\nAI: {agent_msg}");
        let text = if interaction.chars().count() > self.threshold {
            self.summarize(interaction).await
        } else {
            interaction
        };

        let record = MemoryRecord::new(text)
            .with_kind(MemoryType::ConversationHistory)
            .with_session(session_id)
            .with_user(user_id.map(str::to_string))
            .with_user_query(user_msg);
        let id = self.memory.add(record).await?;
        debug!(session_id, id = %id, "Interaction stored");
        Ok(id)
    }

    async fn summarize(&self, interaction: String) -> String {
        let prompt = format!(
            "Summarize the following conversation interaction efficiently, \
             preserving key details and facts:\n\n{interaction}"
        );
        match self.model.generate(&prompt).await {
            Ok(summary) if !summary.trim().is_empty() => format!("SUMMARY: {}", summary.trim()),
            Ok(_) => interaction,
            Err(e) => {
                warn!(error = %e, "History summarization failed, storing full text");
                interaction
            }
        }
    }

    /// Past interactions relevant to `query`, rendered for a prompt.
    /// Empty when nothing is stored for this user.
    pub async fn context(&self, user_id: Option<&str>, query: &str, top_k: usize) -> String {
        let filter = RetrieveFilter::default()
            .of_type(MemoryType::ConversationHistory)
            .for_user(user_id.map(str::to_string));

        let records = match self.memory.retrieve(query, top_k, &filter).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "History retrieval failed");
                return String::new();
            }
        };
        if records.is_empty() {
            return String::new();
        }

        let lines = records
            .iter()
            .map(|r| format!("- {}", r.text))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Relevant Past History:\n{lines}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CountingEmbedder, Reply, SequentialMockModel};
    use cartwise_core::error::LlmError;

    fn history(replies: Vec<Reply>) -> (ConversationHistory, Arc<VectorMemory>) {
        let memory = Arc::new(VectorMemory::new(Arc::new(CountingEmbedder::new())));
        let model = Arc::new(SequentialMockModel::new(replies));
        (ConversationHistory::new(memory.clone(), model), memory)
    }

    #[tokio::test]
    async fn stores_short_interaction_verbatim() {
        let (history, memory) = history(vec![]);
        history
            .add_interaction(Some("u1"), "s1", "find green shoes", "Here are your green shoes.")
            .await
            .unwrap();

        let records = memory.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "User: find green shoes\nAI: Here are your green shoes.");
        assert_eq!(records[0].kind, MemoryType::ConversationHistory);
        assert_eq!(records[0].user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn long_interaction_is_summarized() {
        let (history, memory) = history(vec![Reply::Text("User wants shoes.".into())]);
        let history = history.with_threshold(20);
        history
            .add_interaction(None, "s1", "find me some green shoes please", "ok")
            .await
            .unwrap();
        assert_eq!(memory.records().await[0].text, "SUMMARY: User wants shoes.");
    }

    #[tokio::test]
    async fn summary_failure_keeps_original() {
        let (history, memory) = history(vec![Reply::Fail(LlmError::Network("down".into()))]);
        let history = history.with_threshold(10);
        history
            .add_interaction(None, "s1", "find green shoes", "none left")
            .await
            .unwrap();
        assert_eq!(
            memory.records().await[0].text,
            "User: find green shoes\nAI: none left"
        );
    }

    #[tokio::test]
    async fn context_is_empty_without_history() {
        let (history, _) = history(vec![]);
        assert_eq!(history.context(Some("u1"), "shoes", DEFAULT_HISTORY_TOP_K).await, "");
    }

    #[tokio::test]
    async fn context_filters_by_user_and_type() {
        let (history, memory) = history(vec![]);
        history
            .add_interaction(Some("u1"), "s1", "green shoes", "Green Shoe A")
            .await
            .unwrap();
        history
            .add_interaction(Some("u2"), "s2", "green shoes", "Green Shoe B")
            .await
            .unwrap();
        memory
            .add(MemoryRecord::new("Tool call: search").with_user(Some("u1".into())))
            .await
            .unwrap();

        let ctx = history.context(Some("u1"), "green shoes", DEFAULT_HISTORY_TOP_K).await;
        assert_eq!(ctx, "Relevant Past History:\n- User: green shoes\nAI: Green Shoe A");
    }
}
