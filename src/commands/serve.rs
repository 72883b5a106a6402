//! Serve commands - Matching API and local index service

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use resume_match::search::index::WriteMode;
use resume_match::server::{create_index_router, create_router, serve, AppState};
use resume_match::{DataPaths, Settings};
use resume_match::search::vectordb::SqliteIndex;

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))
}

/// Run the matching API
pub async fn run_api(settings: &Settings) -> Result<()> {
    let matcher = settings.build_matcher()?;
    let state = Arc::new(AppState {
        matcher: Arc::new(matcher),
        retry: settings.retry.clone(),
        default_top_k: settings.matching.default_top_k,
    });

    let addr = socket_addr(&settings.server.host, settings.server.port)?;
    serve(create_router(state), addr, "matching-api").await
}

/// Run the SQLite-backed index service
pub async fn run_index_server(
    settings: &Settings,
    db: Option<PathBuf>,
    port: u16,
    write_mode: WriteMode,
) -> Result<()> {
    let db_path = db.unwrap_or_else(|| DataPaths::new().index_db);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = SqliteIndex::open(&db_path, write_mode)?;
    tracing::info!(db = %db_path.display(), write_mode = ?write_mode, "Opened index store");

    let addr = socket_addr(&settings.server.host, port)?;
    serve(create_index_router(Arc::new(store)), addr, "index-service").await
}
