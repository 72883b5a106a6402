//! Client for the remote vector index service (JSON over HTTP).
//!
//! Wire protocol:
//! - `POST /index/{name}/create` `{dimension, metric}`
//! - `POST /index/{name}/add`    `{data: [{id, values, metadata}]}`
//! - `POST /index/{name}/search` `{vector, top_k}` → `{results: [...]}`

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::embedding::Embedding;
use super::index::{
    check_top_k, rank_results, IndexConfig, IndexRecord, Metric, RecordMetadata, SearchResult,
    VectorIndex,
};
use crate::error::{MatchError, Result};

/// Where the index service lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct IndexServiceConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for IndexServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRequest {
    pub dimension: usize,
    pub metric: Metric,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddRequest {
    pub data: Vec<WireRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
}

/// Error body returned by the index service on non-2xx.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<usize>,
}

/// [`VectorIndex`] over the remote service.
pub struct HttpIndexClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    /// Dimensions of indices known to this client, for pre-flight checks
    dimensions: RwLock<HashMap<String, usize>>,
}

impl HttpIndexClient {
    /// `index` seeds the known dimension of the configured index.
    pub fn new(service: IndexServiceConfig, index: &IndexConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(service.timeout)
            .build()
            .map_err(|e| MatchError::Network(e.to_string()))?;

        let mut dimensions = HashMap::new();
        dimensions.insert(index.name.clone(), index.dimension);

        Ok(Self {
            client,
            base_url: service.base_url.trim_end_matches('/').to_string(),
            timeout: service.timeout,
            dimensions: RwLock::new(dimensions),
        })
    }

    fn url(&self, name: &str, action: &str) -> String {
        format!("{}/index/{}/{}", self.base_url, name, action)
    }

    fn known_dimension(&self, name: &str) -> Option<usize> {
        self.dimensions
            .read()
            .ok()
            .and_then(|dims| dims.get(name).copied())
    }

    fn check_dimension(&self, name: &str, actual: usize) -> Result<()> {
        match self.known_dimension(name) {
            Some(expected) if expected != actual => {
                Err(MatchError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        url: String,
        body: &T,
        name: &str,
    ) -> Result<Response> {
        debug!(operation, url = %url, "Index request");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MatchError::timeout(operation, self.timeout)
                } else {
                    MatchError::Network(format!("{} {}: {}", operation, url, e))
                }
            })?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        Err(classify_status(status, &text, name))
    }
}

/// Map a non-2xx response onto the error taxonomy.
fn classify_status(status: StatusCode, text: &str, name: &str) -> MatchError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = if body.message.is_empty() {
        text.to_string()
    } else {
        body.message.clone()
    };

    match status {
        StatusCode::NOT_FOUND => MatchError::IndexNotFound(name.to_string()),
        StatusCode::CONFLICT => MatchError::IndexConflict {
            name: name.to_string(),
            detail: message,
        },
        StatusCode::BAD_REQUEST if body.error == "dimension_mismatch" => {
            MatchError::DimensionMismatch {
                expected: body.expected.unwrap_or_default(),
                actual: body.actual.unwrap_or_default(),
            }
        }
        StatusCode::BAD_REQUEST if body.error == "invalid_input" => {
            MatchError::InvalidInput(message)
        }
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            MatchError::Network(format!("index service returned {}: {}", s, message))
        }
        s => MatchError::IndexRequest {
            status: s.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl VectorIndex for HttpIndexClient {
    async fn create_index(&self, name: &str, dimension: usize, metric: Metric) -> Result<()> {
        let body = CreateRequest { dimension, metric };
        self.post("create_index", self.url(name, "create"), &body, name)
            .await?;

        if let Ok(mut dims) = self.dimensions.write() {
            dims.insert(name.to_string(), dimension);
        }
        Ok(())
    }

    async fn upsert(&self, name: &str, record: IndexRecord) -> Result<()> {
        self.check_dimension(name, record.vector.dimension())?;

        let body = AddRequest {
            data: vec![WireRecord {
                id: record.id,
                values: record.vector.into_values(),
                metadata: record.metadata,
            }],
        };
        self.post("upsert", self.url(name, "add"), &body, name)
            .await?;
        Ok(())
    }

    async fn search(&self, name: &str, vector: &Embedding, top_k: usize) -> Result<SearchResult> {
        check_top_k(top_k)?;
        self.check_dimension(name, vector.dimension())?;

        let body = SearchRequest {
            vector: vector.values().to_vec(),
            top_k,
        };
        let resp = self
            .post("search", self.url(name, "search"), &body, name)
            .await?;

        let parsed: SearchResult = resp.json().await.map_err(|e| MatchError::IndexRequest {
            status: 200,
            message: format!("malformed search response: {}", e),
        })?;

        // Do not trust the service for ordering or length
        Ok(SearchResult {
            results: rank_results(parsed.results, top_k),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::index::WriteMode;
    use crate::core::document::DocumentKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, dimension: usize) -> HttpIndexClient {
        let index = IndexConfig {
            dimension,
            ..IndexConfig::named("jobs")
        };
        HttpIndexClient::new(
            IndexServiceConfig {
                base_url: server.uri(),
                timeout: Duration::from_secs(5),
            },
            &index,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_sends_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index/jobs/create"))
            .and(body_json(json!({"dimension": 3, "metric": "cosine"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, 3);
        client.create_index("jobs", 3, Metric::Cosine).await.unwrap();
        client.create_index("jobs", 3, Metric::Cosine).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_mode_stays_client_side() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index/jobs/create"))
            .and(body_json(json!({"dimension": 3, "metric": "cosine"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let index = IndexConfig {
            dimension: 3,
            write_mode: WriteMode::Append,
            ..IndexConfig::named("jobs")
        };
        let client = HttpIndexClient::new(
            IndexServiceConfig {
                base_url: server.uri(),
                timeout: Duration::from_secs(5),
            },
            &index,
        )
        .unwrap();
        client.create_index("jobs", 3, Metric::Cosine).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index/jobs/create"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({"error": "index_conflict", "message": "metric differs"})),
            )
            .mount(&server)
            .await;

        let err = client(&server, 3)
            .create_index("jobs", 3, Metric::Dot)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::IndexConflict { ref detail, .. } if detail == "metric differs"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_upsert_wire_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index/jobs/add"))
            .and(body_json(json!({
                "data": [{
                    "id": "job1.txt",
                    "values": [1.0, 0.0, 0.0],
                    "metadata": {"type": "job", "filename": "job1.txt"}
                }]
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let record = IndexRecord::for_document(
            "job1.txt",
            DocumentKind::Job,
            Embedding::new(vec![1.0, 0.0, 0.0]),
        );
        client(&server, 3).upsert("jobs", record).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_dimension_checked_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let record =
            IndexRecord::for_document("a.txt", DocumentKind::Job, Embedding::new(vec![1.0]));
        assert!(matches!(
            client(&server, 3).upsert("jobs", record).await,
            Err(MatchError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index/missing/add"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/index/busy/add"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/index/odd/add"))
            .respond_with(ResponseTemplate::new(418).set_body_string("teapot"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/index/narrow/add"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "dimension_mismatch",
                "message": "bad length",
                "expected": 2,
                "actual": 3
            })))
            .mount(&server)
            .await;

        let client = client(&server, 3);
        let record = || {
            IndexRecord::for_document("a.txt", DocumentKind::Job, Embedding::new(vec![0.0; 3]))
        };

        let missing = client.upsert("missing", record()).await.unwrap_err();
        assert!(matches!(missing, MatchError::IndexNotFound(ref n) if n == "missing"));

        let busy = client.upsert("busy", record()).await.unwrap_err();
        assert!(matches!(busy, MatchError::Network(_)));
        assert!(busy.is_retryable());

        let odd = client.upsert("odd", record()).await.unwrap_err();
        assert!(matches!(odd, MatchError::IndexRequest { status: 418, ref message } if message == "teapot"));

        let narrow = client.upsert("narrow", record()).await.unwrap_err();
        assert!(matches!(
            narrow,
            MatchError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_search_reranks_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index/jobs/search"))
            .and(body_json(json!({"vector": [1.0, 0.0, 0.0], "top_k": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"id": "b.txt", "score": 0.5, "metadata": {"type": "job", "filename": "b.txt"}},
                    {"id": "c.txt", "score": 0.9, "metadata": {"type": "job", "filename": "c.txt"}},
                    {"id": "a.txt", "score": 0.5, "metadata": {"type": "job", "filename": "a.txt"}}
                ]
            })))
            .mount(&server)
            .await;

        let result = client(&server, 3)
            .search("jobs", &Embedding::new(vec![1.0, 0.0, 0.0]), 2)
            .await
            .unwrap();
        assert_eq!(result.ids(), vec!["c.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn test_search_rejects_zero_top_k() {
        let server = MockServer::start().await;
        assert!(matches!(
            client(&server, 3)
                .search("jobs", &Embedding::new(vec![0.0; 3]), 0)
                .await,
            Err(MatchError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let client = HttpIndexClient::new(
            IndexServiceConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                timeout: Duration::from_secs(2),
            },
            &IndexConfig::default(),
        )
        .unwrap();

        let err = client
            .create_index("resume_job_index", 384, Metric::Cosine)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
