//! Layered settings: defaults -> YAML file -> environment -> CLI flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::paths::DataPaths;
use crate::retry::RetryPolicy;
use crate::search::embedding::{EmbeddingProvider, HtpEmbedder, EMBEDDING_DIM};
use crate::search::http_index::{HttpIndexClient, IndexServiceConfig};
use crate::search::index::{IndexConfig, IndexHandle};
use crate::search::ingest::{IngestOptions, IngestPipeline};
use crate::search::matcher::{MatchOptions, MatchService};
use crate::search::remote_embedding::{HttpEmbedder, HttpEmbedderConfig};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "resume-match.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_index_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_index_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local deterministic HTP embedder
    #[default]
    Htp,
    /// OpenAI-compatible embeddings endpoint
    Http,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Usually supplied through the environment rather than the file
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(default)]
    pub jobs_dir: Option<PathBuf>,
    #[serde(default)]
    pub resumes_dir: Option<PathBuf>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_document_timeout_ms")]
    pub document_timeout_ms: u64,
}

fn default_concurrency() -> usize {
    4
}

fn default_document_timeout_ms() -> u64 {
    60_000
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            jobs_dir: None,
            resumes_dir: None,
            concurrency: default_concurrency(),
            document_timeout_ms: default_document_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSettings {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    100
}

fn default_max_candidates() -> usize {
    1000
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            max_candidates: default_max_candidates(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub index_service: ServiceSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub matching: MatchSettings,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub server: ServerSettings,
    /// trace, debug, info, warn, error
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Settings {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };

        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Environment overrides; `lookup` is injectable for tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("RESUME_MATCH_INDEX_URL") {
            self.index_service.url = url;
        }
        if let Some(name) = lookup("RESUME_MATCH_INDEX_NAME") {
            self.index.name = name;
        }
        if let Some(url) = lookup("RESUME_MATCH_EMBEDDING_URL") {
            self.embedding.url = Some(url);
            self.embedding.backend = EmbeddingBackend::Http;
        }
        if let Some(key) = lookup("RESUME_MATCH_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(level) = lookup("RESUME_MATCH_LOG") {
            self.log_level = Some(level);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.name.trim().is_empty() {
            bail!("index.name must not be empty");
        }
        if self.index.dimension == 0 {
            bail!("index.dimension must be > 0");
        }
        if self.ingest.concurrency == 0 {
            bail!("ingest.concurrency must be > 0");
        }
        if self.matching.default_top_k == 0 || self.matching.max_top_k == 0 {
            bail!("matching.default_top_k and matching.max_top_k must be > 0");
        }
        if self.index_service.timeout_ms == 0
            || self.matching.timeout_ms == 0
            || self.ingest.document_timeout_ms == 0
        {
            bail!("timeouts must be > 0");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be > 0");
        }
        if self.embedding.backend == EmbeddingBackend::Htp && self.index.dimension != EMBEDDING_DIM {
            bail!(
                "index.dimension is {} but the htp embedder produces {} dimensions",
                self.index.dimension,
                EMBEDDING_DIM
            );
        }
        if self.embedding.backend == EmbeddingBackend::Http && self.embedding.url.is_none() {
            bail!("embedding.url is required for the http backend");
        }
        Ok(())
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn source_dir(&self, kind: crate::core::document::DocumentKind) -> PathBuf {
        use crate::core::document::DocumentKind;

        let paths = DataPaths::new();
        match kind {
            DocumentKind::Job => self.ingest.jobs_dir.clone().unwrap_or(paths.jobs),
            DocumentKind::Resume => self.ingest.resumes_dir.clone().unwrap_or(paths.resumes),
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            concurrency: self.ingest.concurrency,
            document_timeout: Duration::from_millis(self.ingest.document_timeout_ms),
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            max_top_k: self.matching.max_top_k,
            max_candidates: self.matching.max_candidates,
            timeout: Duration::from_millis(self.matching.timeout_ms),
        }
    }

    pub fn build_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        match self.embedding.backend {
            EmbeddingBackend::Htp => Ok(Arc::new(HtpEmbedder::new())),
            EmbeddingBackend::Http => {
                let base_url = self
                    .embedding
                    .url
                    .clone()
                    .context("embedding.url is required for the http backend")?;
                let embedder = HttpEmbedder::new(HttpEmbedderConfig {
                    base_url,
                    model: self
                        .embedding
                        .model
                        .clone()
                        .unwrap_or_else(|| "all-MiniLM-L6-v2".to_string()),
                    api_key: self.embedding.api_key.clone(),
                    dimension: self.index.dimension,
                    timeout: Duration::from_millis(
                        self.embedding.timeout_ms.unwrap_or(default_timeout_ms()),
                    ),
                })?;
                Ok(Arc::new(embedder))
            }
        }
    }

    /// Handle on the configured index behind the remote service.
    pub fn build_index_handle(&self) -> Result<Arc<IndexHandle>> {
        let client = HttpIndexClient::new(
            IndexServiceConfig {
                base_url: self.index_service.url.clone(),
                timeout: Duration::from_millis(self.index_service.timeout_ms),
            },
            &self.index,
        )?;
        Ok(Arc::new(IndexHandle::new(Arc::new(client), self.index.clone())))
    }

    pub fn build_pipeline(&self) -> Result<IngestPipeline> {
        Ok(IngestPipeline::new(
            self.build_embedder()?,
            self.build_index_handle()?,
            self.ingest_options(),
        ))
    }

    pub fn build_matcher(&self) -> Result<MatchService> {
        Ok(MatchService::new(
            self.build_embedder()?,
            self.build_index_handle()?,
            self.match_options(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::index::{Metric, WriteMode};

    #[test]
    fn test_defaults_match_service_constants() {
        let settings = Settings::default();
        assert_eq!(settings.index.name, "resume_job_index");
        assert_eq!(settings.index.dimension, 384);
        assert_eq!(settings.index.metric, Metric::Cosine);
        assert_eq!(settings.index_service.url, "http://localhost:8080");
        assert_eq!(settings.matching.default_top_k, 5);
        assert_eq!(settings.log_level(), "info");
        settings.validate().unwrap();
    }

    #[test]
    fn test_yaml_partial_override() {
        let settings = Settings::from_yaml(
            r#"
index:
  name: staging_index
  write_mode: append
index_service:
  url: http://index.internal:9000
ingest:
  concurrency: 8
  jobs_dir: /srv/jobs
retry:
  max_attempts: 5
"#,
        )
        .unwrap();

        assert_eq!(settings.index.name, "staging_index");
        assert_eq!(settings.index.dimension, 384);
        assert_eq!(settings.index.write_mode, WriteMode::Append);
        assert_eq!(settings.index_service.url, "http://index.internal:9000");
        assert_eq!(settings.index_service.timeout_ms, 30_000);
        assert_eq!(settings.ingest.concurrency, 8);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_interval_ms, 200);
        assert_eq!(
            settings.source_dir(crate::core::document::DocumentKind::Job),
            PathBuf::from("/srv/jobs")
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_env(|key| match key {
            "RESUME_MATCH_INDEX_URL" => Some("http://other:8080".to_string()),
            "RESUME_MATCH_EMBEDDING_URL" => Some("http://embed:11434/v1".to_string()),
            "RESUME_MATCH_LOG" => Some("debug".to_string()),
            _ => None,
        });

        assert_eq!(settings.index_service.url, "http://other:8080");
        assert_eq!(settings.embedding.backend, EmbeddingBackend::Http);
        assert_eq!(settings.log_level(), "debug");
        settings.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.ingest.concurrency = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.embedding.backend = EmbeddingBackend::Http;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.index.dimension = 512;
        assert!(settings.validate().is_err());

        assert!(Settings::from_yaml("index: [not, a, map]").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        std::fs::write(&path, "matching:\n  default_top_k: 3\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.matching.default_top_k, 3);
        assert!(Settings::from_file(&temp.path().join("missing.yaml")).is_err());
    }
}
