//! Vector index contract shared by the HTTP client and the local store.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

use super::embedding::{Embedding, EmbeddingProvider, EMBEDDING_DIM};
use crate::core::document::DocumentKind;
use crate::error::{MatchError, Result};

/// Similarity metric an index ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Dot,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
        }
    }

    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => super::embedding::cosine_similarity(a, b),
            Self::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            other => Err(MatchError::InvalidInput(format!("unknown metric '{}'", other))),
        }
    }
}

/// How repeated writes of the same id behave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// A write replaces any earlier record with the same id
    #[default]
    Upsert,
    /// Every write is kept; search reports each id once
    Append,
}

/// Identity and shape of one named index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_metric")]
    pub metric: Metric,
    /// Applied by [`SqliteIndex`](super::vectordb::SqliteIndex) only. Against a
    /// remote service the service's own add semantics decide.
    #[serde(default)]
    pub write_mode: WriteMode,
}

fn default_index_name() -> String {
    "resume_job_index".to_string()
}

fn default_dimension() -> usize {
    EMBEDDING_DIM
}

fn default_metric() -> Metric {
    Metric::Cosine
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            dimension: default_dimension(),
            metric: default_metric(),
            write_mode: WriteMode::default(),
        }
    }
}

impl IndexConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Tags stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Embedding,
    pub metadata: RecordMetadata,
}

impl IndexRecord {
    /// Record for a document file; the filename is the id.
    pub fn for_document(filename: &str, kind: DocumentKind, vector: Embedding) -> Self {
        Self {
            id: filename.to_string(),
            vector,
            metadata: RecordMetadata {
                kind,
                filename: filename.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Ranked matches for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub results: Vec<ScoredRecord>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.id.as_str()).collect()
    }
}

/// Orders by score descending then id ascending, keeps the first (best)
/// entry per id and truncates to `top_k`.
pub fn rank_results(mut records: Vec<ScoredRecord>, top_k: usize) -> Vec<ScoredRecord> {
    records.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.id.clone()));
    records.truncate(top_k);
    records
}

pub(crate) fn check_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(MatchError::InvalidInput("top_k must be at least 1".to_string()));
    }
    Ok(())
}

/// Typed operations over a named vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent; `IndexConflict` if `name` exists with another shape.
    async fn create_index(&self, name: &str, dimension: usize, metric: Metric) -> Result<()>;

    /// Insert or overwrite by record id.
    async fn upsert(&self, name: &str, record: IndexRecord) -> Result<()>;

    async fn search(&self, name: &str, vector: &Embedding, top_k: usize) -> Result<SearchResult>;
}

/// Process-wide handle to the configured index, created on first use.
pub struct IndexHandle {
    index: Arc<dyn VectorIndex>,
    config: IndexConfig,
    created: OnceCell<()>,
}

impl IndexHandle {
    pub fn new(index: Arc<dyn VectorIndex>, config: IndexConfig) -> Self {
        Self {
            index,
            config,
            created: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// `DimensionMismatch` if `provider` produces vectors of another length
    /// than this index stores.
    pub fn check_provider(&self, provider: &dyn EmbeddingProvider) -> Result<()> {
        if provider.dimension() != self.config.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.config.dimension,
                actual: provider.dimension(),
            });
        }
        Ok(())
    }

    pub async fn ensure_created(&self) -> Result<()> {
        self.created
            .get_or_try_init(|| async {
                self.index
                    .create_index(&self.config.name, self.config.dimension, self.config.metric)
                    .await?;
                info!(
                    index = %self.config.name,
                    dimension = self.config.dimension,
                    metric = %self.config.metric,
                    "Index ready"
                );
                Ok::<(), MatchError>(())
            })
            .await?;
        Ok(())
    }

    pub async fn upsert(&self, record: IndexRecord) -> Result<()> {
        self.ensure_created().await?;
        self.index.upsert(&self.config.name, record).await
    }

    pub async fn search(&self, vector: &Embedding, top_k: usize) -> Result<SearchResult> {
        self.ensure_created().await?;
        self.index.search(&self.config.name, vector, top_k).await
    }
}
