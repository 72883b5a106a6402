use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::error::ApiError;
use super::SharedState;
use crate::core::document::DocumentKind;
use crate::retry::with_retry;
use crate::search::index::SearchResult;

#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub job_description: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Keep only documents of this kind; unfiltered when absent
    #[serde(default)]
    pub filter_type: Option<DocumentKind>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub resume_text: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub filter_type: Option<DocumentKind>,
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Resume-Job Matching API is running.",
        "application": env!("CARGO_PKG_NAME"),
    }))
}

pub async fn match_job_to_resumes(
    State(state): State<SharedState>,
    Json(request): Json<JobRequest>,
) -> Result<Json<SearchResult>, ApiError> {
    run_match(&state, &request.job_description, request.top_k, request.filter_type).await
}

pub async fn match_resume_to_jobs(
    State(state): State<SharedState>,
    Json(request): Json<ResumeRequest>,
) -> Result<Json<SearchResult>, ApiError> {
    run_match(&state, &request.resume_text, request.top_k, request.filter_type).await
}

async fn run_match(
    state: &SharedState,
    text: &str,
    top_k: Option<usize>,
    filter: Option<DocumentKind>,
) -> Result<Json<SearchResult>, ApiError> {
    let top_k = top_k.unwrap_or(state.default_top_k);
    debug!(top_k, filter = ?filter, chars = text.len(), "Match request");

    let result = with_retry(&state.retry, "match", || {
        state.matcher.find_matches(text, top_k, filter)
    })
    .await?;

    Ok(Json(result))
}
