//! Ingestion pipeline - documents on disk into the vector index

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::embedding::EmbeddingProvider;
use super::index::{IndexHandle, IndexRecord};
use crate::core::document::{discover_documents, Document, DocumentKind};
use crate::error::{MatchError, Result};

/// Tuning for a batch run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Documents in flight at once
    pub concurrency: usize,
    /// Deadline for extract + embed + upsert of a single document
    pub document_timeout: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            document_timeout: Duration::from_secs(60),
        }
    }
}

/// One document that could not be ingested.
#[derive(Debug)]
pub struct IngestFailure {
    pub filename: String,
    pub error: MatchError,
}

/// Outcome of a batch run. `failed` is in discovery (filename) order.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub succeeded: usize,
    pub failed: Vec<IngestFailure>,
    pub duration_ms: u128,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<IndexHandle>,
    options: IngestOptions,
}

impl IngestPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<IndexHandle>,
        options: IngestOptions,
    ) -> Self {
        Self {
            embedder,
            index,
            options,
        }
    }

    /// Ingest every document of `kind` in `source`.
    ///
    /// Per-document failures are collected in the report. A missing source
    /// directory, an embedder/index dimension mismatch or an index that cannot
    /// be created aborts the run before any document is processed.
    pub async fn ingest(&self, source: &Path, kind: DocumentKind) -> Result<IngestReport> {
        let start = Instant::now();
        let paths = discover_documents(source, kind)?;
        self.index.check_provider(self.embedder.as_ref())?;

        info!(
            source = %source.display(),
            kind = %kind,
            documents = paths.len(),
            index = %self.index.config().name,
            write_mode = ?self.index.config().write_mode,
            "Starting ingestion"
        );

        self.index.ensure_created().await?;

        let width = self.options.concurrency.max(1);
        let outcomes: Vec<_> = stream::iter(paths)
            .map(|path| async move {
                let filename = display_name(&path);
                let outcome = self.ingest_document(&path, kind).await;
                (filename, outcome)
            })
            .buffered(width)
            .collect()
            .await;

        let mut report = IngestReport::default();
        for (filename, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    warn!(file = %filename, kind = error.kind(), error = %error, "Failed to ingest");
                    report.failed.push(IngestFailure { filename, error });
                }
            }
        }
        report.duration_ms = start.elapsed().as_millis();

        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            duration_ms = report.duration_ms as u64,
            "Ingestion finished"
        );

        Ok(report)
    }

    /// Extract, embed and upsert one document within the per-document deadline.
    ///
    /// The upsert is a single request, so a timeout leaves either the old
    /// record or the new one in the index, never a partial write.
    pub async fn ingest_document(&self, path: &Path, kind: DocumentKind) -> Result<()> {
        let deadline = self.options.document_timeout;
        tokio::time::timeout(deadline, async {
            let document = Document::load(path, kind).await?;
            self.store(&document).await
        })
        .await
        .map_err(|_| MatchError::timeout("ingest_document", deadline))?
    }

    /// Embed an already-loaded document and write it to the index.
    pub async fn store(&self, document: &Document) -> Result<()> {
        let embedding = self.embedder.embed(&document.raw_text).await?;
        let record = IndexRecord::for_document(document.filename(), document.kind, embedding);
        self.index.upsert(record).await?;
        debug!(id = %document.id, "Upserted document");
        Ok(())
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedding::{Embedding, HtpEmbedder};
    use crate::search::index::{IndexConfig, WriteMode};
    use crate::search::vectordb::SqliteIndex;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn setup() -> (Arc<SqliteIndex>, IngestPipeline) {
        let store = Arc::new(SqliteIndex::open_in_memory(WriteMode::Upsert).unwrap());
        let handle = Arc::new(IndexHandle::new(store.clone(), IndexConfig::named("test")));
        let pipeline = IngestPipeline::new(
            Arc::new(HtpEmbedder::new()),
            handle,
            IngestOptions::default(),
        );
        (store, pipeline)
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a_valid.txt"), "rust backend engineer").unwrap();
        std::fs::write(temp.path().join("b_blank.txt"), "   \n").unwrap();
        std::fs::write(temp.path().join("c_binary.txt"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(temp.path().join("d_valid.txt"), "pastry chef").unwrap();
        std::fs::write(temp.path().join("e_valid.txt"), "data scientist").unwrap();

        let (store, pipeline) = setup();
        let report = pipeline.ingest(temp.path(), DocumentKind::Job).await.unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.total(), 5);
        assert_eq!(report.failed[0].filename, "b_blank.txt");
        assert_eq!(report.failed[0].error.kind(), "invalid_input");
        assert_eq!(report.failed[1].filename, "c_binary.txt");
        assert_eq!(report.failed[1].error.kind(), "extraction");
        assert_eq!(store.record_count("test").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let temp = TempDir::new().unwrap();
        let (_, pipeline) = setup();
        let err = pipeline
            .ingest(&temp.path().join("missing"), DocumentKind::Job)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_rerun_overwrites() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("job1.txt"), "seeking backend engineer").unwrap();
        std::fs::write(temp.path().join("job2.txt"), "seeking pastry chef").unwrap();

        let (store, pipeline) = setup();
        pipeline.ingest(temp.path(), DocumentKind::Job).await.unwrap();
        let second = pipeline.ingest(temp.path(), DocumentKind::Job).await.unwrap();

        assert_eq!(second.succeeded, 2);
        assert_eq!(store.record_count("test").unwrap(), 2);
        assert_eq!(store.row_count("test").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_source_creates_index() {
        let temp = TempDir::new().unwrap();
        let (store, pipeline) = setup();
        let report = pipeline.ingest(temp.path(), DocumentKind::Resume).await.unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(store.record_count("test").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_fatal() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("job1.txt"), "seeking backend engineer").unwrap();
        std::fs::write(temp.path().join("job2.txt"), "seeking pastry chef").unwrap();

        let store = Arc::new(SqliteIndex::open_in_memory(WriteMode::Upsert).unwrap());
        let config = IndexConfig {
            dimension: 512,
            ..IndexConfig::named("wide")
        };
        let handle = Arc::new(IndexHandle::new(store.clone(), config));
        let pipeline = IngestPipeline::new(
            Arc::new(HtpEmbedder::new()),
            handle,
            IngestOptions::default(),
        );

        let err = pipeline
            .ingest(temp.path(), DocumentKind::Job)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::DimensionMismatch {
                expected: 512,
                actual: 384
            }
        ));
        // Nothing was created or written
        assert_eq!(store.row_count("wide").unwrap(), 0);
    }

    struct StalledEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StalledEmbedder {
        fn dimension(&self) -> usize {
            384
        }

        fn version(&self) -> &str {
            "stalled"
        }

        async fn embed(&self, _text: &str) -> Result<Embedding> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(MatchError::ProviderUnavailable("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_document_timeout_leaves_no_record() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("slow.txt"), "anything").unwrap();

        let store = Arc::new(SqliteIndex::open_in_memory(WriteMode::Upsert).unwrap());
        let handle = Arc::new(IndexHandle::new(store.clone(), IndexConfig::named("test")));
        let pipeline = IngestPipeline::new(
            Arc::new(StalledEmbedder),
            handle,
            IngestOptions {
                concurrency: 2,
                document_timeout: Duration::from_millis(50),
            },
        );

        let report = pipeline.ingest(temp.path(), DocumentKind::Job).await.unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed[0].error.kind(), "timeout");
        assert_eq!(store.row_count("test").unwrap(), 0);
    }
}
