//! Integration tests for the daemon's HTTP surface.
//!
//! Uses an in-memory store and a face service client pointed at an
//! unreachable address: remote calls degrade (no faces, confidence 0)
//! exactly as they would on a network failure, so routing, validation
//! and the no-face terminal path are exercised without any network.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use facefind_api::{FaceServiceClient, FaceServiceConfig, RateLimiter};
use facefindd::pipeline::MatchEngine;
use facefindd::store::SqliteStore;
use facefindd::{build_router, AppState};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

async fn setup_app() -> (axum::Router, SqliteStore) {
    let store = SqliteStore::open_in_memory().await.unwrap();

    // Nothing listens on the discard port; every remote call fails
    // fast and degrades.
    let client = FaceServiceClient::new(FaceServiceConfig {
        base_url: "http://127.0.0.1:9/facepp/v3".to_string(),
        api_key: "test-key".to_string(),
        api_secret: "test-secret".to_string(),
        timeout: Duration::from_millis(200),
    })
    .unwrap();

    let engine = Arc::new(MatchEngine::new(
        store.clone(),
        client,
        Arc::new(RateLimiter::new(Duration::ZERO)),
        60.0,
        100,
    ));

    let app = build_router(AppState {
        engine,
        store: store.clone(),
        started_at: chrono::Utc::now(),
    });
    (app, store)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_ok() {
    let (app, _store) = setup_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_match_rejects_blank_fields() {
    let (app, _store) = setup_app().await;

    let response = app
        .oneshot(post_json(
            "/match",
            json!({"participant_id": "", "selfie_url": "http://s.jpg", "event_id": "ev"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_match_with_unreachable_service_is_no_face_result() {
    let (app, store) = setup_app().await;
    let participant = store.add_participant("ev", None, "http://s.jpg").await.unwrap();

    let response = app
        .oneshot(post_json(
            "/match",
            json!({
                "participant_id": participant,
                "selfie_url": "http://s.jpg",
                "event_id": "ev"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Detection degraded to zero faces: a typed failure, not a 5xx.
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["match_count"], 0);
    assert_eq!(body["reason"], "no-face-in-selfie");
}

#[tokio::test]
async fn test_photo_registration_and_deletion() {
    let (app, _store) = setup_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/photos",
            json!({"event_id": "ev", "original_url": "http://p/1.jpg"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let photo_id = body_json(response).await["photo_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(delete(&format!("/photos/{photo_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(delete(&format!("/photos/{photo_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_detect_unknown_photo_is_404() {
    let (app, _store) = setup_app().await;

    let response = app
        .oneshot(post_json("/photos/nope/detect", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_participant_matches_listing() {
    let (app, store) = setup_app().await;
    let participant = store.add_participant("ev", Some("a@b.c"), "http://s.jpg").await.unwrap();
    let photo = store.add_photo("ev", "http://p/1.jpg").await.unwrap();
    use facefindd::store::MatchStore;
    store.insert_match(&participant, &photo, 71.5).await.unwrap();

    let response = app
        .oneshot(get(&format!("/participants/{participant}/matches")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["participant_id"], participant.as_str());
    assert_eq!(body["matches"][0]["photo_id"], photo.as_str());
    assert_eq!(body["matches"][0]["confidence"], 71.5);
}

#[tokio::test]
async fn test_matches_for_unknown_participant_is_404() {
    let (app, _store) = setup_app().await;

    let response = app
        .oneshot(get("/participants/nope/matches"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_refresh_event_with_unreachable_service_clears_faces() {
    let (app, store) = setup_app().await;
    let photo = store.add_photo("ev", "http://p/1.jpg").await.unwrap();
    use facefind_core::{DetectedFace, FaceRect};
    use facefindd::store::MatchStore;
    store
        .replace_photo_faces(
            &photo,
            vec![DetectedFace {
                token: "stale".to_string(),
                rect: FaceRect { top: 0, left: 0, width: 2, height: 2 },
            }],
        )
        .await
        .unwrap();

    let response = app
        .oneshot(post_json("/events/ev/refresh", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["processed_photos"], 1);
    assert_eq!(body["total_faces"], 0);
    // The failed detection pass still replaces the stale tokens.
    assert!(store.candidate_faces_for_event("ev").await.unwrap().is_empty());
}
