//! Local vector index on SQLite
//!
//! Stores embeddings as BLOBs and computes similarity in Rust. Backs the
//! local index service and the test suites; speaks the same contract as the
//! remote service.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::embedding::Embedding;
use super::index::{
    check_top_k, rank_results, IndexRecord, Metric, RecordMetadata, ScoredRecord, SearchResult,
    VectorIndex, WriteMode,
};
use crate::error::{MatchError, Result};

/// SQLite-backed [`VectorIndex`]
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    write_mode: WriteMode,
}

impl SqliteIndex {
    /// Open or create database at path
    pub fn open(db_path: &Path, write_mode: WriteMode) -> Result<Self> {
        Self::init(Connection::open(db_path)?, write_mode)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory(write_mode: WriteMode) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, write_mode)
    }

    fn init(conn: Connection, write_mode: WriteMode) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS indexes (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                metric TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            -- No uniqueness on (index_name, record_id): append mode keeps every write
            CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                index_name TEXT NOT NULL,
                record_id TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,  -- JSON object
                indexed_at INTEGER NOT NULL,
                FOREIGN KEY (index_name) REFERENCES indexes(name) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_records_id ON records(index_name, record_id);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            write_mode,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MatchError::Storage("connection lock poisoned".to_string()))
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Dimension and metric of `name`, if it exists
    fn index_shape(conn: &Connection, name: &str) -> Result<Option<(usize, Metric)>> {
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT dimension, metric FROM indexes WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((dimension, metric)) => Ok(Some((dimension as usize, metric.parse()?))),
            None => Ok(None),
        }
    }

    fn require_shape(conn: &Connection, name: &str) -> Result<(usize, Metric)> {
        Self::index_shape(conn, name)?.ok_or_else(|| MatchError::IndexNotFound(name.to_string()))
    }

    /// Number of distinct record ids in `name`
    pub fn record_count(&self, name: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT record_id) FROM records WHERE index_name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of stored rows in `name`, duplicates included
    pub fn row_count(&self, name: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE index_name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn create_index(&self, name: &str, dimension: usize, metric: Metric) -> Result<()> {
        if dimension == 0 {
            return Err(MatchError::InvalidInput("dimension must be at least 1".to_string()));
        }

        let conn = self.lock()?;
        match Self::index_shape(&conn, name)? {
            Some((existing_dim, existing_metric)) => {
                if existing_dim != dimension || existing_metric != metric {
                    return Err(MatchError::IndexConflict {
                        name: name.to_string(),
                        detail: format!(
                            "exists with dimension={} metric={}, requested dimension={} metric={}",
                            existing_dim, existing_metric, dimension, metric
                        ),
                    });
                }
                Ok(())
            }
            None => {
                conn.execute(
                    "INSERT INTO indexes (name, dimension, metric, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        name,
                        dimension as i64,
                        metric.as_str(),
                        chrono::Utc::now().timestamp()
                    ],
                )?;
                Ok(())
            }
        }
    }

    async fn upsert(&self, name: &str, record: IndexRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let (dimension, _) = Self::require_shape(&conn, name)?;

        if record.vector.dimension() != dimension {
            return Err(MatchError::DimensionMismatch {
                expected: dimension,
                actual: record.vector.dimension(),
            });
        }

        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| MatchError::Storage(e.to_string()))?;
        let blob = embedding_to_blob(record.vector.values());
        let now = chrono::Utc::now().timestamp();

        // Replace-then-insert in one transaction so a record is never half written
        let tx = conn.transaction()?;
        if self.write_mode == WriteMode::Upsert {
            tx.execute(
                "DELETE FROM records WHERE index_name = ?1 AND record_id = ?2",
                params![name, record.id],
            )?;
        }
        tx.execute(
            r#"
            INSERT INTO records (index_name, record_id, embedding, metadata, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![name, record.id, blob, metadata, now],
        )?;
        tx.commit()?;

        Ok(())
    }

    async fn search(&self, name: &str, vector: &Embedding, top_k: usize) -> Result<SearchResult> {
        check_top_k(top_k)?;

        let conn = self.lock()?;
        let (dimension, metric) = Self::require_shape(&conn, name)?;

        if vector.dimension() != dimension {
            return Err(MatchError::DimensionMismatch {
                expected: dimension,
                actual: vector.dimension(),
            });
        }

        // Full scan; fine for the corpus sizes this store is used with.
        // Later rows win score ties for the same id in append mode.
        let mut stmt = conn.prepare(
            "SELECT record_id, embedding, metadata FROM records WHERE index_name = ?1 ORDER BY seq DESC",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, blob, metadata_json) = row?;
            let metadata: RecordMetadata = serde_json::from_str(&metadata_json)
                .map_err(|e| MatchError::Storage(format!("corrupt metadata for {}: {}", id, e)))?;
            let stored = blob_to_embedding(&blob)?;
            scored.push(ScoredRecord {
                score: metric.score(vector.values(), &stored),
                id,
                metadata,
            });
        }

        Ok(SearchResult {
            results: rank_results(scored, top_k),
        })
    }
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert BLOB to f32 embedding
fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(MatchError::Storage(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
