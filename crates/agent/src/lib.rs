//! The Cartwise agent loop.
//!
//! One run moves a single `AgentState` through a fixed cycle:
//!
//! 1. **Perceive** the input: intent, entities, a tool hint
//! 2. **Retrieve** session memories relevant to it
//! 3. **Decide**: call a tool, or answer
//! 4. **Execute** the tool through the run's `ToolGateway`
//! 5. **Remember** the tool output and loop back with the result
//!
//! The run ends on a final answer, a tool error, or the step budget.

pub mod cart;
pub mod decision;
pub mod history;
pub mod loop_runner;
pub mod perception;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cart::{AutoConfirm, Confirmer, StdinConfirmer, is_affirmative};
pub use decision::{DecisionMode, DecisionPolicy, DecisionStage, PlanContext};
pub use history::ConversationHistory;
pub use loop_runner::{AgentLoop, DEFAULT_MAX_STEPS, DEFAULT_TOP_K, RunOutcome};
pub use perception::PerceptionStage;
