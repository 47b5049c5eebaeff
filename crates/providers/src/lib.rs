//! Model and embedder implementations for Cartwise.
//!
//! All backends implement the `cartwise_core` seams (`LanguageModel`,
//! `Embedder`, `ToolProvider`). `build_from_config` wires them from
//! `AppConfig`.

pub mod deadline;
pub mod factory;
pub mod hash;
pub mod openai_compat;

pub use deadline::{DeadlineEmbedder, DeadlineModel, DeadlineTools};
pub use factory::{Collaborators, build_client, build_embedder, build_from_config, is_local};
pub use hash::HashEmbedder;
pub use openai_compat::OpenAiCompatClient;
