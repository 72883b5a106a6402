//! resume-match library
//!
//! Semantic matching between job descriptions and resumes.
//!
//! # Modules
//!
//! - `core`: Documents, kinds and data directory layout
//! - `search`: Embedding, vector index, ingestion and matching
//! - `config`: Layered settings and service wiring
//! - `server`: HTTP matching API and local index service (feature `server`)

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod retry;
pub mod search;
#[cfg(feature = "server")]
pub mod server;

// Re-exports for convenience
pub use config::Settings;
pub use core::document::{discover_documents, Document, DocumentKind};
pub use core::paths::DataPaths;
pub use error::{MatchError, Result};
pub use retry::{with_retry, RetryPolicy};
pub use search::index::{rank_results, ScoredRecord};
pub use search::ingest::{IngestFailure, IngestOptions};
