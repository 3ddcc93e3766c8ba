//! Integration tests for the identity webhook route.
//!
//! Router tests run against a pool that never connects; every case here
//! is rejected or acknowledged before the database is touched. Tests
//! marked `#[ignore]` need `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;

use sellerdesk_integration_tests::{
    app, body_json, db_state, lazy_state, send, sign_in, signed_webhook, test_database,
    unique_external_id, user_event,
};

#[tokio::test]
async fn test_missing_headers_is_bad_request() {
    let app = app(lazy_state(true));
    let payload = user_event("user.created", "user_1", "one@shop.example");

    let response = send(
        &app,
        Request::post("/api/webhooks/identity")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "missing webhook headers");
}

#[tokio::test]
async fn test_missing_secret_is_server_error() {
    let app = app(lazy_state(false));
    let payload = user_event("user.created", "user_1", "one@shop.example");

    let response = send(&app, signed_webhook(&payload, Utc::now())).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Internal server error");
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let app = app(lazy_state(true));
    let payload = user_event("user.created", "user_1", "one@shop.example");
    let request = signed_webhook(&payload, Utc::now());

    let (parts, _) = request.into_parts();
    let forged = user_event("user.created", "user_1", "attacker@evil.example");
    let response = send(&app, Request::from_parts(parts, Body::from(forged))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid webhook signature")
    );
}

#[tokio::test]
async fn test_stale_delivery_is_rejected() {
    let app = app(lazy_state(true));
    let payload = user_event("user.created", "user_1", "one@shop.example");
    let sent_at = Utc::now() - chrono::Duration::minutes(10);

    let response = send(&app, signed_webhook(&payload, sent_at)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unhandled_event_is_acknowledged() {
    let app = app(lazy_state(true));
    let payload = r#"{"type":"session.created","data":{"id":"sess_1"}}"#;

    let response = send(&app, signed_webhook(payload, Utc::now())).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["event_type"], "session.created");
}

#[tokio::test]
async fn test_signed_garbage_is_malformed() {
    let app = app(lazy_state(true));

    let response = send(&app, signed_webhook("not json", Utc::now())).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(response).await["error"]
            .as_str()
            .unwrap()
            .starts_with("malformed payload")
    );
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_replayed_create_converges_on_one_row() {
    let Some(db) = test_database().await else {
        return;
    };
    let pool = db.pool().clone();
    let app = app(db_state(db));
    let external_id = unique_external_id();
    let payload = user_event("user.created", &external_id, "replay@shop.example");

    let first = send(&app, signed_webhook(&payload, Utc::now())).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_json(first).await["status"], "created");

    let second = send(&app, signed_webhook(&payload, Utc::now())).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await["status"], "updated");

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE external_id = $1")
        .bind(&external_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_update_event_changes_email_seen_by_api() {
    let Some(db) = test_database().await else {
        return;
    };
    let app = app(db_state(db));
    let external_id = unique_external_id();

    let created = user_event("user.created", &external_id, "before@shop.example");
    assert_eq!(
        send(&app, signed_webhook(&created, Utc::now())).await.status(),
        StatusCode::OK
    );
    let updated = user_event("user.updated", &external_id, "after@shop.example");
    assert_eq!(
        send(&app, signed_webhook(&updated, Utc::now())).await.status(),
        StatusCode::OK
    );

    let cookie = sign_in(&app, &external_id, "after@shop.example").await;
    let response = send(
        &app,
        Request::get("/api/me")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "after@shop.example");
    assert_eq!(body["role"], "SELLER");
    assert!(body["profile"].is_null());
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_email_taken_by_other_user_is_server_error() {
    let Some(db) = test_database().await else {
        return;
    };
    let app = app(db_state(db));

    let first = user_event("user.created", &unique_external_id(), "shared@shop.example");
    assert_eq!(
        send(&app, signed_webhook(&first, Utc::now())).await.status(),
        StatusCode::OK
    );

    let second = user_event("user.created", &unique_external_id(), "shared@shop.example");
    let response = send(&app, signed_webhook(&second, Utc::now())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
