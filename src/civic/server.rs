use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::Uri,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, ApiError, AppState};
use super::db::{CivicDb, DbHandle};
use super::geo::{Coordinates, DEFAULT_MAP_CENTER};
use super::identity::LocalIdentity;
use super::ws;
use crate::errors::CivicError;

/// Configuration for the civic service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub map_center: Coordinates,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_path: PathBuf::from(".civic/civic.db"),
            dev_mode: false,
            map_center: DEFAULT_MAP_CENTER,
        }
    }
}

/// Build the full application router: JSON API plus the dashboard socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> Response {
    ApiError(CivicError::NotFound {
        entity: "Route",
        id: uri.path().to_string(),
    })
    .into_response()
}

/// Open (and migrate) the database at `path`, creating parent directories.
pub fn open_database(path: &std::path::Path) -> Result<CivicDb> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    CivicDb::new(path).context("Failed to initialize civic database")
}

pub fn build_state(db: DbHandle, map_center: Coordinates) -> Arc<AppState> {
    let (ws_tx, _rx) = broadcast::channel::<String>(256);
    Arc::new(AppState {
        repo: Arc::new(db.clone()),
        identity: Arc::new(LocalIdentity::new(db)),
        ws_tx,
        map_center,
    })
}

/// Start the civic service and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = DbHandle::new(open_database(&config.db_path)?);
    let state = build_state(db, config.map_center);

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(
        addr = %local_addr,
        db = %config.db_path.display(),
        dev_mode = config.dev_mode,
        "civic service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "failed to install Ctrl+C handler; waiting indefinitely");
            std::future::pending::<()>().await;
        }
    }
}
