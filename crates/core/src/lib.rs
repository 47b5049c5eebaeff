//! # Cartwise Core
//!
//! Domain types, collaborator traits, and error definitions for the Cartwise
//! product-search agent. This crate has **no framework dependencies**: it
//! defines the model every other crate implements against.
//!
//! ## Seams
//!
//! The loop talks to three external collaborators, each a trait here:
//! - [`LanguageModel`] for free-text and structured generation
//! - [`Embedder`] for turning memory text into vectors
//! - [`ToolProvider`] for listing and calling tools
//!
//! Implementations live in `cartwise-providers`, `cartwise-memory` and
//! `cartwise-tools`; tests swap in scripted doubles.

pub mod decision;
pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod perception;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use decision::{Decision, DecisionResult, DecisionType, UNKNOWN_ANSWER};
pub use error::{CallError, DecisionError, Error, LlmError, MemoryError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use llm::LanguageModel;
pub use memory::{Embedder, MemoryRecord, MemoryType, RetrieveFilter};
pub use perception::PerceptionResult;
pub use state::{AgentState, ExecutedCall, MAX_STEPS_ANSWER, Phase};
pub use tool::{
    ContentItem, Tool, ToolCallResult, ToolDescriptor, ToolOutput, ToolProvider, ToolRegistry,
    ToolResponse,
};
