//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use tessera::api::{
    CheckResponse, EntryJson, FeedQuery, FeedSummary, HealthResponse, PublishResponse,
    StatusResponse, StoreResponse, status_for,
};
use tessera_core::{
    CacheStats, Cid, Feed, FeedEntry, MemoryStore, PublishOutcome, SessionStatus, TesseraError,
    TypeTag,
};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// STATUS RESPONSE TESTS
// =============================================================================

#[test]
fn test_status_response_from_session_status() {
    let status = SessionStatus {
        backend: "redb",
        root: Some(Cid::digest(b"root")),
        feeds: 2,
        entries: 41,
        cache: CacheStats {
            definitions: 2,
            file_infos: 0,
            entities: 5,
            feeds: 2,
        },
    };

    let response = StatusResponse::from(&status);
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["backend"], "redb");
    assert_eq!(json["root"], Cid::digest(b"root").as_str());
    assert_eq!(json["feed_count"], 2);
    assert_eq!(json["entry_count"], 41);
    assert_eq!(json["cache"]["entities"], 5);
}

#[test]
fn test_status_response_without_root() {
    let status = SessionStatus {
        backend: "memory",
        root: None,
        feeds: 0,
        entries: 0,
        cache: CacheStats::default(),
    };

    let json = serde_json::to_string(&StatusResponse::from(&status)).unwrap();
    assert!(json.contains("\"root\":null"));
}

// =============================================================================
// STORE / CHECK RESPONSE TESTS
// =============================================================================

#[test]
fn test_store_response_success_and_error() {
    let cid = Cid::digest(b"definition");
    let ok = StoreResponse::success(&cid);
    assert!(ok.success);
    assert_eq!(ok.cid.as_deref(), Some(cid.as_str()));
    assert!(ok.error.is_none());

    let err = StoreResponse::error("bad record");
    assert!(!err.success);
    assert!(err.cid.is_none());
    assert_eq!(err.error.as_deref(), Some("bad record"));
}

#[test]
fn test_check_response() {
    assert!(CheckResponse::valid().valid);
    let invalid = CheckResponse::invalid("missing part");
    assert!(!invalid.valid);
    assert_eq!(invalid.error.as_deref(), Some("missing part"));
}

// =============================================================================
// PUBLISH RESPONSE TESTS
// =============================================================================

#[test]
fn test_publish_response_from_published() {
    let outcome = PublishOutcome::Published {
        entity: Cid::digest(b"entity"),
        root: Cid::digest(b"root"),
        sequence_number: 9,
    };

    let response = PublishResponse::from(&outcome);

    assert!(response.success);
    assert_eq!(response.sequence_number, Some(9));
    assert_eq!(response.entity.as_deref(), Some(Cid::digest(b"entity").as_str()));
    assert!(response.error.is_none());
}

#[test]
fn test_publish_response_from_rejected() {
    let outcome = PublishOutcome::Rejected(TesseraError::Schema("no parts".to_string()));

    let response = PublishResponse::from(&outcome);

    assert!(!response.success);
    assert!(response.root.is_none());
    assert!(response.error.unwrap().contains("no parts"));
}

// =============================================================================
// FEED TYPE TESTS
// =============================================================================

#[test]
fn test_feed_summary() {
    let mut store = MemoryStore::new();
    let mut feed = Feed::make_empty("v0", 1).unwrap();
    for n in 0..4u64 {
        feed = feed.append(&mut store, Cid::digest(&n.to_le_bytes())).unwrap();
    }
    let entity_type = Cid::digest(b"type");

    let summary = FeedSummary::new(&entity_type, &feed);

    assert_eq!(summary.entity_type, entity_type.as_str());
    assert_eq!(summary.next_sequence_number, 4);
    assert_eq!(summary.recent_count as u64 + summary.evicted_count, 4);
    assert_eq!(
        summary.latest.as_deref(),
        Some(Cid::digest(&3u64.to_le_bytes()).as_str())
    );
}

#[test]
fn test_entry_json_from_feed_entry() {
    let entry = FeedEntry::new(3, Cid::digest(b"item"));
    let json = EntryJson::from(&entry);

    assert_eq!(json.sequence_number, 3);
    assert_eq!(json.item, Cid::digest(b"item").as_str());
}

#[test]
fn test_feed_query_defaults_to_recent() {
    let query: FeedQuery = serde_json::from_str("{}").unwrap();
    assert!(!query.all);

    let query: FeedQuery = serde_json::from_str(r#"{"all":true}"#).unwrap();
    assert!(query.all);
}

// =============================================================================
// STATUS CODE MAPPING TESTS
// =============================================================================

#[test]
fn test_status_for_error_taxonomy() {
    let cid = Cid::digest(b"x");

    assert_eq!(
        status_for(&TesseraError::format("Entity", "trailing comma")),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status_for(&TesseraError::MissingObject(cid.clone())),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        status_for(&TesseraError::TypeMismatch {
            part: "age".to_string(),
            expected: TypeTag::Integer,
            reason: "not digits".to_string(),
        }),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        status_for(&TesseraError::PartsMismatch {
            missing: vec!["name".to_string()],
            unexpected: vec![],
        }),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        status_for(&TesseraError::RootConflict {
            expected: None,
            found: Some(cid),
        }),
        StatusCode::CONFLICT
    );
    assert_eq!(
        status_for(&TesseraError::Store("disk full".to_string())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
