//! Run state threaded through the agent loop.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::decision::DecisionResult;
use crate::memory::MemoryRecord;
use crate::perception::PerceptionResult;
use crate::tool::ToolCallResult;

/// Final answer used when the step budget runs out.
pub const MAX_STEPS_ANSWER: &str = "[Max steps reached]";

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Perception,
    MemoryRetrieval,
    Decision,
    ToolExecution,
    MemoryUpdate,
    ErrorHandler,
    Terminal,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Perception => "perception",
            Phase::MemoryRetrieval => "memory_retrieval",
            Phase::Decision => "decision",
            Phase::ToolExecution => "tool_execution",
            Phase::MemoryUpdate => "memory_update",
            Phase::ErrorHandler => "error_handler",
            Phase::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool call already executed in this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedCall {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

/// The single mutable record owned by one loop run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Input for the current iteration; rewritten after each tool step
    pub user_input: String,

    /// Fixed at loop start
    pub original_query: String,

    pub session_id: String,

    pub user_id: Option<String>,

    pub perception: Option<PerceptionResult>,

    /// Replaced every iteration
    pub memory_items: Vec<MemoryRecord>,

    pub decision: Option<DecisionResult>,

    pub tool_result: Option<ToolCallResult>,

    pub step: u32,

    pub max_steps: u32,

    pub final_answer: Option<String>,

    pub error: Option<String>,

    pub should_continue: bool,

    /// Calls executed so far, oldest first
    pub calls: Vec<ExecutedCall>,

    pub phase: Phase,

    /// Bumped on every transition
    pub version: u64,
}

impl AgentState {
    pub fn new(
        query: impl Into<String>,
        session_id: impl Into<String>,
        user_id: Option<String>,
        max_steps: u32,
    ) -> Self {
        let query = query.into();
        Self {
            user_input: query.clone(),
            original_query: query,
            session_id: session_id.into(),
            user_id,
            perception: None,
            memory_items: Vec::new(),
            decision: None,
            tool_result: None,
            step: 0,
            max_steps,
            final_answer: None,
            error: None,
            should_continue: true,
            calls: Vec::new(),
            phase: Phase::Perception,
            version: 0,
        }
    }

    /// Move to `phase`. Terminal is absorbing.
    pub fn transition(&mut self, phase: Phase) {
        if self.phase == Phase::Terminal {
            return;
        }
        self.phase = phase;
        self.version += 1;
        if phase == Phase::Terminal {
            self.should_continue = false;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::Terminal
    }

    pub fn budget_exhausted(&self) -> bool {
        self.step >= self.max_steps
    }

    /// The prompt for the next iteration after a tool produced `result`.
    pub fn continuation_prompt(&self, result: &str) -> String {
        format!(
            "Original task: {}\nPrevious output: {}\nWhat should I do next?",
            self.original_query, result
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_perception() {
        let state = AgentState::new("find green shoes", "s1", None, 5);
        assert_eq!(state.step, 0);
        assert_eq!(state.user_input, state.original_query);
        assert!(state.should_continue);
        assert_eq!(state.phase, Phase::Perception);
        assert!(state.final_answer.is_none() && state.error.is_none());
    }

    #[test]
    fn terminal_is_absorbing() {
        let mut state = AgentState::new("q", "s1", None, 5);
        state.transition(Phase::Decision);
        state.transition(Phase::Terminal);
        let version = state.version;
        assert!(!state.should_continue);

        state.transition(Phase::Perception);
        assert!(state.is_terminal());
        assert_eq!(state.version, version);
    }

    #[test]
    fn continuation_embeds_original_query() {
        let state = AgentState::new("find green shoes", "s1", None, 5);
        let prompt = state.continuation_prompt("[Green Shoe A]");
        assert!(prompt.starts_with("Original task: find green shoes\n"));
        assert!(prompt.contains("Previous output: [Green Shoe A]"));
        assert!(prompt.ends_with("What should I do next?"));
    }
}
