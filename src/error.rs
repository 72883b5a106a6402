//! Error taxonomy for the matching pipeline.
//!
//! Callers branch on [`MatchError::is_retryable`] to decide between a bounded
//! retry and surfacing the failure immediately.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the embedding, index, ingestion and matching layers.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Bad caller input (blank text, top_k of zero, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Embedding provider could not be reached or refused to serve
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Index has not been created yet
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Transport-level failure talking to a remote service
    #[error("Network error: {0}")]
    Network(String),

    /// Operation did not finish within its deadline
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    /// Vector length disagrees with the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Index exists with a different dimension or metric
    #[error("Index conflict for '{name}': {detail}")]
    IndexConflict { name: String, detail: String },

    /// Ingestion source directory is missing or unreadable
    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Text could not be extracted from a document
    #[error("Extraction failed for {path}: {reason}")]
    Extraction { path: String, reason: String },

    /// Index service answered with an unexpected non-success status
    #[error("Index request failed ({status}): {message}")]
    IndexRequest { status: u16, message: String },

    /// Local index store failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl MatchError {
    /// Stable snake_case name, used in logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::IndexNotFound(_) => "index_not_found",
            Self::Network(_) => "network",
            Self::Timeout { .. } => "timeout",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::IndexConflict { .. } => "index_conflict",
            Self::SourceNotFound(_) => "source_not_found",
            Self::Extraction { .. } => "extraction",
            Self::IndexRequest { .. } => "index_request",
            Self::Storage(_) => "storage",
        }
    }

    /// Transient failures that a boundary layer may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_)
                | Self::IndexNotFound(_)
                | Self::Network(_)
                | Self::Timeout { .. }
        )
    }

    pub(crate) fn timeout(operation: &'static str, after: std::time::Duration) -> Self {
        Self::Timeout {
            operation,
            after_ms: after.as_millis() as u64,
        }
    }
}

impl From<rusqlite::Error> for MatchError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
