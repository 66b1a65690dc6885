//! HTTP API integration tests.
//!
//! Drives the full router (CORS, correlation ids, session auth, handlers)
//! over the in-memory store, listing cache and sessions.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use aca_inscriptions::types::InscriptionStatus;
use aca_inscriptions::CancellationPolicy;
use axum::http::{header, Method, StatusCode};
use common::{event, inscription, seed, seeded, Options, ORGANIZER, OTHER, OWNER};
use serde_json::json;

// ============================================================================
// Cancellation scenarios
// ============================================================================

#[tokio::test]
async fn owner_cancels_inscription() {
    let app = seeded();

    let response = app.delete("/api/inscripciones/I42", Some(OWNER)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["message"], "Inscription cancelled");
    assert_eq!(
        response.body["data"],
        json!({"inscriptionId": "I42", "eventId": "E7", "currentParticipants": 4})
    );
    assert_eq!(app.store.participants(&"E7".into()), Some(4));

    let after = app.get("/api/inscripciones/I42", Some(OWNER)).await;
    assert_eq!(after.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_owner_is_forbidden() {
    let app = seeded();
    let before = app.store.snapshot();

    let response = app.delete("/api/inscripciones/I42", Some(OTHER)).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["code"], "FORBIDDEN");
    assert_eq!(app.store.snapshot(), before);
}

#[tokio::test]
async fn unknown_inscription_is_not_found() {
    let app = seeded();
    let before = app.store.snapshot();

    let response = app
        .delete("/api/inscripciones/does-not-exist", Some(OWNER))
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["code"], "NOT_FOUND");
    assert_eq!(response.body["error"], "Inscription not found");
    assert_eq!(app.store.snapshot(), before);
}

#[tokio::test]
async fn counter_at_zero_stays_zero() {
    let app = common::app();
    seed(&app, 0);

    let response = app.delete("/api/inscripciones/I42", Some(OWNER)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.store.participants(&"E7".into()), Some(0));
}

#[tokio::test]
async fn second_cancel_is_not_found() {
    let app = seeded();

    let first = app.delete("/api/inscripciones/I42", Some(OWNER)).await;
    let second = app.delete("/api/inscripciones/I42", Some(OWNER)).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.participants(&"E7".into()), Some(4));
}

#[tokio::test]
async fn concurrent_cancels_release_one_seat() {
    let app = seeded();

    let (a, b) = tokio::join!(
        app.delete("/api/inscripciones/I42", Some(OWNER)),
        app.delete("/api/inscripciones/I42", Some(OWNER)),
    );

    let mut statuses = [a.status, b.status];
    statuses.sort_by_key(StatusCode::as_u16);
    assert_eq!(statuses, [StatusCode::OK, StatusCode::NOT_FOUND]);
    let loser = if a.status == StatusCode::OK { &b } else { &a };
    assert_eq!(loser.body["code"], "NOT_FOUND");
    assert_eq!(app.store.participants(&"E7".into()), Some(4));
}

#[tokio::test]
async fn organizer_needs_staff_override() {
    let app = seeded();
    let denied = app.delete("/api/inscripciones/I42", Some(ORGANIZER)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let app = common::app_with(Options {
        policy: CancellationPolicy::OwnerOrStaff,
        ..Options::default()
    });
    seed(&app, 5);
    let allowed = app.delete("/api/inscripciones/I42", Some(ORGANIZER)).await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(app.store.participants(&"E7".into()), Some(4));
}

#[tokio::test]
async fn partial_failure_is_reported_distinctly() {
    let app = seeded();
    app.store.fail_next_release();

    let response = app.delete("/api/inscripciones/I42", Some(OWNER)).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "PARTIALLY_APPLIED");
    assert_eq!(app.store.participants(&"E7".into()), Some(5));
    let gone = app.get("/api/inscripciones/I42", Some(OWNER)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn storage_failure_applies_nothing() {
    let app = seeded();
    app.store.fail_next_delete();
    let before = app.store.snapshot();

    let response = app.delete("/api/inscripciones/I42", Some(OWNER)).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "INTERNAL_SERVER_ERROR");
    assert!(!response.body["error"].as_str().unwrap().contains("injected"));
    assert_eq!(app.store.snapshot(), before);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn missing_or_unknown_token_is_unauthorized() {
    let app = seeded();
    let before = app.store.snapshot();

    let anonymous = app.delete("/api/inscripciones/I42", None).await;
    let forged = app.delete("/api/inscripciones/I42", Some("tok-forged")).await;

    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.body["success"], false);
    assert_eq!(app.store.snapshot(), before);
}

// ============================================================================
// Listing cache invalidation
// ============================================================================

#[tokio::test]
async fn enumerated_listings_reflect_cancel() {
    let app = seeded();

    let mut warmed = Vec::new();
    for status in ["published", "draft", "all"] {
        for event_type in ["all", "encuentro", "taller", "webinar"] {
            for page in 1..=5 {
                let query = format!("?status={status}&type={event_type}&page={page}");
                if app.listed_participants(&query, "E7").await == Some(5) {
                    warmed.push(query);
                }
            }
        }
    }
    assert_eq!(warmed.len(), 4, "E7 is on page 1 of four filter combinations");

    let response = app.delete("/api/inscripciones/I42", Some(OWNER)).await;
    assert_eq!(response.status, StatusCode::OK);

    for query in &warmed {
        assert_eq!(app.listed_participants(query, "E7").await, Some(4), "{query}");
    }
}

#[tokio::test]
async fn searched_and_deep_pages_reflect_cancel() {
    let app = common::app_with(Options {
        legacy_sweep: false,
        ..Options::default()
    });
    for day in 1..=6 {
        let mut earlier = event(&format!("E0{day}"), "Taller de parrilla", 1);
        earlier.starts_at = aca_testing::test_epoch() - chrono::Duration::days(10 - day);
        app.store.put_event(earlier);
    }
    seed(&app, 5);

    let searched = "?search=Nacional";
    let deep = "?limit=1&page=7";
    assert_eq!(app.listed_participants(searched, "E7").await, Some(5));
    assert_eq!(app.listed_participants(deep, "E7").await, Some(5));

    let response = app.delete("/api/inscripciones/I42", Some(OWNER)).await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(app.listed_participants(searched, "E7").await, Some(4));
    assert_eq!(app.listed_participants(deep, "E7").await, Some(4));
}

#[tokio::test]
async fn listing_is_served_from_cache_until_invalidated() {
    let app = seeded();
    assert_eq!(app.listed_participants("", "E7").await, Some(5));

    // A write behind the service's back is hidden by the cache...
    app.store.put_event(event("E7", "Encuentro Nacional", 9));
    assert_eq!(app.listed_participants("", "E7").await, Some(5));

    // ...until the TTL passes.
    app.clock.advance(chrono::Duration::seconds(61));
    assert_eq!(app.listed_participants("", "E7").await, Some(9));
}

#[tokio::test]
async fn invalid_listing_filter_is_bad_request() {
    let app = seeded();
    let response = app.get("/api/eventos?type=concierto", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "BAD_REQUEST");
}

// ============================================================================
// Registration and reads
// ============================================================================

#[tokio::test]
async fn register_then_cancel_round_trip() {
    let app = common::app();
    app.store.put_event(event("E8", "Webinar de asados", 3));

    let created = app
        .post("/api/inscripciones", Some(OTHER), json!({ "eventId": "E8" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["status"], "confirmed");
    assert_eq!(created.body["data"]["userId"], "U2");
    assert_eq!(app.store.participants(&"E8".into()), Some(4));

    let duplicate = app
        .post("/api/inscripciones", Some(OTHER), json!({ "eventId": "E8" }))
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);

    let id = created.body["data"]["id"].as_str().unwrap().to_string();
    let cancelled = app
        .delete(&format!("/api/inscripciones/{id}"), Some(OTHER))
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(app.store.participants(&"E8".into()), Some(3));
}

#[tokio::test]
async fn malformed_register_body_is_bad_request() {
    let app = seeded();
    let response = app
        .post("/api/inscripciones", Some(OWNER), json!({ "event": "E7" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn member_lists_only_own_inscriptions() {
    let app = seeded();
    app.store
        .put_inscription(inscription("I43", "U2", "E7", InscriptionStatus::Waitlist));

    let response = app.get("/api/inscripciones", Some(OWNER)).await;

    assert_eq!(response.status, StatusCode::OK);
    let ids: Vec<&str> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["I42"]);
}

#[tokio::test]
async fn event_detail_is_public() {
    let app = seeded();

    let found = app.get("/api/eventos/E7", None).await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body["data"]["type"], "encuentro");
    assert_eq!(found.body["data"]["currentParticipants"], 5);

    let missing = app.get("/api/eventos/E404", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "Event not found");
}

// ============================================================================
// Cross-cutting layers
// ============================================================================

#[tokio::test]
async fn preflight_is_answered_without_auth() {
    let app = seeded();

    let response = app
        .request(Method::OPTIONS, "/api/inscripciones/I42", None, None)
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.body, serde_json::Value::Null);
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, DELETE, OPTIONS"
    );
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
    assert!(response.headers.contains_key(aca_web::CORRELATION_ID_HEADER));
}

#[tokio::test]
async fn error_responses_carry_cors_and_correlation_headers() {
    let app = common::app_with(Options {
        allow_origin: "https://acachile.cl".to_string(),
        ..Options::default()
    });

    let response = app.delete("/api/inscripciones/I1", Some(OWNER)).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://acachile.cl"
    );
    assert!(response.headers.contains_key(aca_web::CORRELATION_ID_HEADER));
}

#[tokio::test]
async fn health_reports_ok() {
    let app = common::app();
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}
