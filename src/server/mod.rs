//! HTTP boundary: the matching API and the local index service.

pub mod error;
pub mod handlers;
pub mod index_api;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::retry::RetryPolicy;
use crate::search::matcher::MatchService;

pub use index_api::create_index_router;

#[derive(Clone)]
pub struct AppState {
    pub matcher: Arc<MatchService>,
    pub retry: RetryPolicy,
    pub default_top_k: usize,
}

pub type SharedState = Arc<AppState>;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/match_job_to_resumes", post(handlers::match_job_to_resumes))
        .route("/match_resume_to_jobs", post(handlers::match_resume_to_jobs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve `app` until Ctrl-C.
pub async fn serve(app: Router, addr: SocketAddr, name: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, name, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!(name, "Shut down");
    Ok(())
}

async fn shutdown_signal() {
    // An install failure just means we run until killed
    let _ = tokio::signal::ctrl_c().await;
}
