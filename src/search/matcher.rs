//! Matching service - embeds a query document and ranks indexed documents

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::embedding::{require_text, EmbeddingProvider};
use super::index::{check_top_k, IndexHandle, SearchResult};
use crate::core::document::DocumentKind;
use crate::error::{MatchError, Result};

#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Requests above this are clamped
    pub max_top_k: usize,
    /// Upper bound on records fetched while filling a type-filtered result
    pub max_candidates: usize,
    pub timeout: Duration,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_top_k: 100,
            max_candidates: 1000,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Query-side entry point: text in, ranked index records out.
///
/// Errors propagate unchanged; retrying is left to the caller.
pub struct MatchService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<IndexHandle>,
    options: MatchOptions,
}

impl MatchService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<IndexHandle>,
        options: MatchOptions,
    ) -> Self {
        Self {
            embedder,
            index,
            options,
        }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Unfiltered match across every document kind in the index.
    pub async fn match_text(&self, query_text: &str, top_k: usize) -> Result<SearchResult> {
        self.find_matches(query_text, top_k, None).await
    }

    /// Match `query_text`, optionally keeping only records of `filter_type`.
    pub async fn find_matches(
        &self,
        query_text: &str,
        top_k: usize,
        filter_type: Option<DocumentKind>,
    ) -> Result<SearchResult> {
        // Validate before touching the provider or the index
        require_text(query_text)?;
        check_top_k(top_k)?;
        self.index.check_provider(self.embedder.as_ref())?;
        let top_k = top_k.min(self.options.max_top_k.max(1));

        let deadline = self.options.timeout;
        tokio::time::timeout(deadline, self.run(query_text, top_k, filter_type))
            .await
            .map_err(|_| MatchError::timeout("match", deadline))?
    }

    async fn run(
        &self,
        query_text: &str,
        top_k: usize,
        filter_type: Option<DocumentKind>,
    ) -> Result<SearchResult> {
        let embedding = self.embedder.embed(query_text).await?;

        let Some(kind) = filter_type else {
            return self.index.search(&embedding, top_k).await;
        };

        // The index cannot filter, so widen the query until enough records of
        // the wanted kind show up or there is nothing more to fetch.
        let cap = self.options.max_candidates.max(top_k);
        let mut fetch = top_k;
        loop {
            let page = self.index.search(&embedding, fetch).await?;
            let exhausted = page.len() < fetch || fetch >= cap;

            let mut filtered: Vec<_> = page
                .results
                .into_iter()
                .filter(|r| r.metadata.kind == kind)
                .collect();

            if filtered.len() >= top_k || exhausted {
                filtered.truncate(top_k);
                debug!(fetched = fetch, kept = filtered.len(), kind = %kind, "Filtered match");
                return Ok(SearchResult { results: filtered });
            }

            fetch = (fetch * 2).min(cap);
        }
    }
}
