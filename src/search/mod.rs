//! Embedding, vector index and the ingest/match pipelines built on them.
//!
//! - `embedding`: deterministic local embedder and the provider trait
//! - `remote_embedding`: OpenAI-style HTTP embedding provider
//! - `index`: index types, ranking rules and the `VectorIndex` trait
//! - `vectordb`: SQLite-backed index
//! - `http_index`: client for the remote index service
//! - `ingest`: document source -> index
//! - `matcher`: query text -> ranked records

pub mod embedding;
pub mod http_index;
pub mod index;
pub mod ingest;
pub mod matcher;
pub mod remote_embedding;
pub mod vectordb;

pub use embedding::{Embedding, EmbeddingProvider, HtpEmbedder};
pub use http_index::{HttpIndexClient, IndexServiceConfig};
pub use index::{IndexConfig, IndexHandle, IndexRecord, Metric, SearchResult, VectorIndex, WriteMode};
pub use ingest::{IngestPipeline, IngestReport};
pub use matcher::{MatchOptions, MatchService};
pub use remote_embedding::HttpEmbedder;
pub use vectordb::SqliteIndex;
