//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! ## Status codes
//!
//! | Error                                   | Status |
//! |-----------------------------------------|--------|
//! | malformed record or address             | 400    |
//! | missing object                          | 404    |
//! | root moved under a publish              | 409    |
//! | any other validation rejection          | 422    |
//! | store or I/O failure                    | 500    |

use super::{
    AppState,
    types::{
        CheckResponse, EntryJson, ErrorResponse, FeedQuery, FeedResponse, FeedSummary,
        FeedsResponse, HealthResponse, LookupResponse, PublishResponse, StatusResponse,
        StoreResponse,
    },
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tessera_core::{
    Cid, Entity, EntityDefinition, FileInfo, PublishOutcome, Record, Session, TesseraError,
};

/// Map an error to the HTTP status it is reported with.
pub fn status_for(error: &TesseraError) -> StatusCode {
    match error {
        TesseraError::Format { .. } => StatusCode::BAD_REQUEST,
        TesseraError::MissingObject(_) => StatusCode::NOT_FOUND,
        TesseraError::RootConflict { .. } => StatusCode::CONFLICT,
        e if e.is_rejection() => StatusCode::UNPROCESSABLE_ENTITY,
        e => {
            tracing::error!("Request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: &TesseraError) -> Response {
    (status_for(error), Json(ErrorResponse::new(error.to_string()))).into_response()
}

/// Parse an address taken from the request path.
fn parse_cid(s: &str) -> Result<Cid, Response> {
    Cid::parse(s).map_err(|e| error_response(&e))
}

// =============================================================================
// SESSION ACCESS
// =============================================================================

/// Run `f` under the read lock on the blocking pool.
///
/// Store calls can block on redb I/O or an `ipfs` subprocess.
async fn read_session<T, F>(state: &AppState, f: F) -> Result<T, TesseraError>
where
    F: FnOnce(&Session) -> Result<T, TesseraError> + Send + 'static,
    T: Send + 'static,
{
    let session = Arc::clone(&state.session).read_owned().await;
    tokio::task::spawn_blocking(move || f(&session))
        .await
        .map_err(|e| TesseraError::Io(format!("Session task failed: {}", e)))?
}

/// Run `f` under the write lock on the blocking pool.
async fn write_session<T, F>(state: &AppState, f: F) -> Result<T, TesseraError>
where
    F: FnOnce(&mut Session) -> Result<T, TesseraError> + Send + 'static,
    T: Send + 'static,
{
    let mut session = Arc::clone(&state.session).write_owned().await;
    tokio::task::spawn_blocking(move || f(&mut session))
        .await
        .map_err(|e| TesseraError::Io(format!("Session task failed: {}", e)))?
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get session status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    (StatusCode::OK, Json(StatusResponse::from(&session.status())))
}

// =============================================================================
// RECORD HANDLERS
// =============================================================================

/// Store an entity definition. The returned address is the entity type.
pub async fn define_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let definition = match EntityDefinition::decode(&body) {
        Ok(d) => d,
        Err(e) => return (status_for(&e), Json(StoreResponse::error(e.to_string()))),
    };

    match write_session(&state, move |session| session.define(&definition)).await {
        Ok(cid) => (StatusCode::OK, Json(StoreResponse::success(&cid))),
        Err(e) => (status_for(&e), Json(StoreResponse::error(e.to_string()))),
    }
}

/// Store a file info record.
pub async fn file_info_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let info = match FileInfo::decode(&body) {
        Ok(i) => i,
        Err(e) => return (status_for(&e), Json(StoreResponse::error(e.to_string()))),
    };

    match write_session(&state, move |session| session.store_file_info(&info)).await {
        Ok(cid) => (StatusCode::OK, Json(StoreResponse::success(&cid))),
        Err(e) => (status_for(&e), Json(StoreResponse::error(e.to_string()))),
    }
}

/// Check an entity against its definition without storing anything.
pub async fn check_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let entity = match Entity::decode(&body) {
        Ok(e) => e,
        Err(e) => return (status_for(&e), Json(CheckResponse::invalid(e.to_string()))),
    };

    match read_session(&state, move |session| session.check_entity(&entity)).await {
        Ok(()) => (StatusCode::OK, Json(CheckResponse::valid())),
        Err(e) => (status_for(&e), Json(CheckResponse::invalid(e.to_string()))),
    }
}

/// Validate, store and append an entity, then publish the new root.
pub async fn publish_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let entity = match Entity::decode(&body) {
        Ok(e) => e,
        Err(e) => return (status_for(&e), Json(PublishResponse::error(e.to_string()))),
    };

    match write_session(&state, move |session| session.publish_entity(entity)).await {
        Ok(outcome) => {
            let status = match &outcome {
                PublishOutcome::Published { .. } => StatusCode::OK,
                PublishOutcome::Rejected(e) => status_for(e),
            };
            (status, Json(PublishResponse::from(&outcome)))
        }
        Err(e) => (status_for(&e), Json(PublishResponse::error(e.to_string()))),
    }
}

// =============================================================================
// FEED HANDLERS
// =============================================================================

/// List every feed in the root.
pub async fn feeds_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let feeds = session
        .entity_types()
        .iter()
        .filter_map(|entity_type| {
            session
                .feed(entity_type)
                .map(|feed| FeedSummary::new(entity_type, &feed))
        })
        .collect();

    (StatusCode::OK, Json(FeedsResponse { feeds }))
}

/// Entries of one feed: the recent window, or everything with `?all=true`.
pub async fn feed_handler(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let entity_type = match parse_cid(&entity_type) {
        Ok(cid) => cid,
        Err(response) => return response,
    };

    let all = query.all;
    let requested = entity_type.clone();
    let loaded = read_session(&state, move |session| {
        let Some(feed) = session.feed(&requested) else {
            return Ok(None);
        };
        let entries = if all {
            session.history(&requested)?
        } else {
            feed.recent.clone()
        };
        Ok(Some((feed, entries)))
    })
    .await;

    let (feed, entries) = match loaded {
        Ok(Some(found)) => found,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(format!("No feed for entity type {}", entity_type))),
            )
                .into_response();
        }
        Err(e) => return error_response(&e),
    };
    let entries = entries.iter().map(EntryJson::from).collect();

    let response = FeedResponse {
        entity_type: entity_type.to_string(),
        next_sequence_number: feed.next_sequence_number,
        optimal_recent: feed.optimal_recent,
        complete: all || feed.older.is_empty(),
        entries,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Look up one entry by sequence number, together with its entity.
pub async fn lookup_handler(
    State(state): State<AppState>,
    Path((entity_type, sequence_number)): Path<(String, u64)>,
) -> Response {
    let entity_type = match parse_cid(&entity_type) {
        Ok(cid) => cid,
        Err(response) => return response,
    };

    let requested = entity_type.clone();
    let found = read_session(&state, move |session| {
        let Some(item) = session.lookup(&requested, sequence_number)? else {
            return Ok(None);
        };
        let entity = Entity::clone(&session.load_entity(&item)?.record);
        Ok(Some((item, entity)))
    })
    .await;

    let found = match found {
        Ok(found) => found,
        Err(e) => return error_response(&e),
    };

    let Some((item, entity)) = found else {
        let response = LookupResponse {
            found: false,
            entity_type: entity_type.to_string(),
            sequence_number,
            item: None,
            entity: None,
        };
        return (StatusCode::NOT_FOUND, Json(response)).into_response();
    };

    let response = LookupResponse {
        found: true,
        entity_type: entity_type.to_string(),
        sequence_number,
        item: Some(item.to_string()),
        entity: Some(entity),
    };
    (StatusCode::OK, Json(response)).into_response()
}

// =============================================================================
// OBJECT HANDLER
// =============================================================================

/// Raw bytes behind an address.
pub async fn object_handler(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Response {
    let cid = match parse_cid(&cid) {
        Ok(cid) => cid,
        Err(response) => return response,
    };

    match read_session(&state, move |session| session.raw(&cid)).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
