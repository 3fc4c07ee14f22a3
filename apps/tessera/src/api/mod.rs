//! # Tessera HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Session status
//! - `POST /definitions` - Store an entity definition
//! - `POST /file-infos` - Store a file info record
//! - `POST /entities/check` - Check an entity without publishing it
//! - `POST /entities` - Publish an entity
//! - `GET /feeds` - List feeds
//! - `GET /feeds/{entity_type}` - Feed entries (`?all=true` for full history)
//! - `GET /feeds/{entity_type}/{sequence_number}` - One entry and its entity
//! - `GET /objects/{cid}` - Raw bytes behind an address
//!
//! ## Configuration (Environment Variables)
//!
//! - `TESSERA_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `tessera::api::*`)
pub use handlers::status_for;
pub use types::{
    CacheJson, CheckResponse, EntryJson, ErrorResponse, FeedQuery, FeedResponse, FeedSummary,
    FeedsResponse, HealthResponse, LookupResponse, PublishResponse, StatusResponse, StoreResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tessera_core::{Session, TesseraError, primitives::MAX_RECORD_SIZE};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the session.
#[derive(Clone)]
pub struct AppState {
    /// The session over the user's root.
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    /// Create new app state with a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Origins allowed when `TESSERA_CORS_ORIGINS` is unset or unusable.
const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

/// Parse a comma-separated origin list, skipping entries that are not valid
/// header values.
fn parse_origins(list: &str) -> Vec<HeaderValue> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

fn allow_origins(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build CORS layer from `TESSERA_CORS_ORIGINS`.
///
/// `*` allows every origin; a comma-separated list allows those origins;
/// anything else falls back to localhost only.
fn build_cors_layer() -> CorsLayer {
    let configured = std::env::var("TESSERA_CORS_ORIGINS").ok();

    if configured.as_deref() == Some("*") {
        tracing::warn!("CORS: Allowing ALL origins (TESSERA_CORS_ORIGINS=*)");
        return CorsLayer::permissive();
    }

    let origins = configured.as_deref().map(parse_origins).unwrap_or_default();
    if origins.is_empty() {
        tracing::info!("CORS: localhost origins only");
        allow_origins(parse_origins(&LOCAL_ORIGINS.join(",")))
    } else {
        tracing::info!(count = origins.len(), "CORS: configured origins");
        allow_origins(origins)
    }
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - one record at most
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/definitions", post(handlers::define_handler))
        .route("/file-infos", post(handlers::file_info_handler))
        .route("/entities", post(handlers::publish_handler))
        .route("/entities/check", post(handlers::check_handler))
        .route("/feeds", get(handlers::feeds_handler))
        .route("/feeds/{entity_type}", get(handlers::feed_handler))
        .route(
            "/feeds/{entity_type}/{sequence_number}",
            get(handlers::lookup_handler),
        )
        .route("/objects/{cid}", get(handlers::object_handler))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_RECORD_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, session: Session) -> Result<(), TesseraError> {
    let state = AppState::new(session);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TesseraError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Tessera HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| TesseraError::Io(format!("Server error: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================
