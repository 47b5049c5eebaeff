//! Vector memory for Cartwise.
//!
//! A flat exact-search index with metadata post-filtering, optionally
//! persisted as paired JSON-lines files.

pub mod file_backend;
pub mod store;
pub mod vector;

pub use file_backend::PairedFiles;
pub use store::{DEFAULT_OVERFETCH, MIN_OVERFETCH, VectorMemory};
pub use vector::{l2_squared, nearest};
