//! Local index service speaking the same wire protocol as the remote one,
//! backed by [`SqliteIndex`].

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::debug;

use super::error::error_response;
use crate::error::MatchError;
use crate::search::embedding::Embedding;
use crate::search::http_index::{AddRequest, CreateRequest, SearchRequest};
use crate::search::index::{IndexRecord, SearchResult, VectorIndex};
use crate::search::vectordb::SqliteIndex;

pub type IndexState = Arc<SqliteIndex>;

/// Mirrors the status mapping `HttpIndexClient` expects.
pub struct IndexApiError(MatchError);

impl From<MatchError> for IndexApiError {
    fn from(err: MatchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for IndexApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MatchError::IndexNotFound(_) => StatusCode::NOT_FOUND,
            MatchError::IndexConflict { .. } => StatusCode::CONFLICT,
            MatchError::DimensionMismatch { .. } | MatchError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, &self.0)
    }
}

pub fn create_index_router(state: IndexState) -> Router {
    Router::new()
        .route("/index/:name/create", post(create))
        .route("/index/:name/add", post(add))
        .route("/index/:name/search", post(search))
        .with_state(state)
}

async fn create(
    State(store): State<IndexState>,
    Path(name): Path<String>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<serde_json::Value>, IndexApiError> {
    store
        .create_index(&name, request.dimension, request.metric)
        .await?;
    Ok(Json(json!({"status": "ok", "index": name})))
}

async fn add(
    State(store): State<IndexState>,
    Path(name): Path<String>,
    Json(request): Json<AddRequest>,
) -> Result<Json<serde_json::Value>, IndexApiError> {
    let count = request.data.len();
    for record in request.data {
        store
            .upsert(
                &name,
                IndexRecord {
                    id: record.id,
                    vector: Embedding::new(record.values),
                    metadata: record.metadata,
                },
            )
            .await?;
    }
    debug!(index = %name, count, "Added records");
    Ok(Json(json!({"status": "ok", "count": count})))
}

async fn search(
    State(store): State<IndexState>,
    Path(name): Path<String>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResult>, IndexApiError> {
    let vector = Embedding::new(request.vector);
    let result = store.search(&name, &vector, request.top_k).await?;
    Ok(Json(result))
}
