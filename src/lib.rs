//! Question answering over PDF collections.
//!
//! Layout elements from an external PDF parser are cleaned of running
//! sidebars and repeated annotations, cut into overlapping per-page chunks,
//! embedded into a Qdrant collection and retrieved to ground an LLM answer.

pub mod config;
pub mod error;
pub mod filters;
pub mod formatting;
pub mod indexer;
pub mod layout;
pub mod logger;
pub mod models;
pub mod rag;
pub mod registry;
pub mod setup;

pub use error::{RagError, Result};
