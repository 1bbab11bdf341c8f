//! End-to-end scenarios over the full router with mock backends.

mod common {
    pub mod fixtures;
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use common::fixtures::{
    img, multipart_body, multipart_request, seed_tenant, send, test_app,
};

#[tokio::test]
async fn register_then_verify_same_image_passes() {
    let app = test_app();
    let (_, key) = seed_tenant(&app, json!({}));
    let image = img("person-alice");

    let body = multipart_body(&[("external_id", "alice")], &[("image", &image)]);
    let (status, _) = send(
        &app.router,
        multipart_request("/v1/faces/register", Some(&key), body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let body = multipart_body(&[("external_id", "alice")], &[("image", &image)]);
    let (status, body) = send(
        &app.router,
        multipart_request("/v1/faces/verify", Some(&key), body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert!(body["confidence"].as_f64().unwrap() >= 0.8);
}

#[tokio::test]
async fn verify_with_different_person_fails_and_persists_record() {
    let app = test_app();
    let (_, key) = seed_tenant(&app, json!({}));

    let body = multipart_body(
        &[("external_id", "alice")],
        &[("image", &img("person-alice"))],
    );
    send(
        &app.router,
        multipart_request("/v1/faces/register", Some(&key), body),
    )
    .await;

    let body = multipart_body(
        &[("external_id", "alice")],
        &[("image", &img("person-mallory"))],
    );
    let (status, body) = send(
        &app.router,
        multipart_request("/v1/faces/verify", Some(&key), body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], false);
    assert!(body["confidence"].as_f64().unwrap() < 0.8);

    let records = app.store.verifications();
    assert_eq!(records.len(), 1);
    assert!(!records[0].record.verified);
}

#[tokio::test]
async fn strict_search_returns_empty_and_audits_eventually() {
    let app = test_app();
    let (tenant, key) = seed_tenant(&app, json!({}));

    let body = multipart_body(
        &[("external_id", "alice")],
        &[("image", &img("person-alice"))],
    );
    send(
        &app.router,
        multipart_request("/v1/faces/register", Some(&key), body),
    )
    .await;

    let body = multipart_body(&[], &[("image", &img("person-nobody"))]);
    let (status, body) = send(
        &app.router,
        multipart_request("/v1/faces/search?threshold=0.99", Some(&key), body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["matches"].as_array().unwrap().is_empty());
    let search_id = body["search_id"].as_str().unwrap().to_string();

    // Draining the pipeline persists the pending audit.
    app.search_audit.stop().await;
    let audits = app.store.search_audits();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].id.to_string(), search_id);
    assert_eq!(audits[0].tenant_id, tenant.id);
    assert_eq!(audits[0].results_count, 0);
    assert_eq!(audits[0].threshold, 0.99);
}

#[tokio::test]
async fn thirty_first_search_in_window_is_rate_limited() {
    let app = test_app();
    let (_, key) = seed_tenant(&app, json!({ "search_rate_limit": 30 }));
    let image = img("person-alice");

    for _ in 0..30 {
        let body = multipart_body(&[], &[("image", &image)]);
        let (status, _) = send(
            &app.router,
            multipart_request("/v1/faces/search", Some(&key), body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let body = multipart_body(&[], &[("image", &image)]);
    let (status, body) = send(
        &app.router,
        multipart_request("/v1/faces/search", Some(&key), body),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "SEARCH_RATE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn widget_session_lifecycle() {
    let app = test_app();
    let (tenant, _) = seed_tenant(&app, json!({}));

    // Tenant allows *.example.com; app.example.com gets a session.
    let request = Request::builder()
        .method("POST")
        .uri("/v1/widget/session")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "public_key": tenant.public_key,
                "origin": "https://app.example.com",
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = body["session_id"].as_str().unwrap().to_string();
    let session_uuid = session_id.parse().unwrap();

    // The session authorizes widget search.
    let form = multipart_body(
        &[("session_id", session_id.as_str())],
        &[("image", &img("person-w"))],
    );
    let (status, _) = send(
        &app.router,
        multipart_request("/v1/widget/search", None, form),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Ten minutes later the same session is rejected, reaped or not.
    app.sessions
        .force_expiry(session_uuid, Utc::now() - ChronoDuration::seconds(1));

    let form = multipart_body(
        &[("session_id", session_id.as_str())],
        &[("image", &img("person-w"))],
    );
    let (status, body) = send(
        &app.router,
        multipart_request("/v1/widget/search", None, form),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn group_shot_register_writes_nothing() {
    let app = test_app();
    let (_tenant, key) = seed_tenant(&app, json!({}));

    let body = multipart_body(
        &[("external_id", "crowd")],
        &[("image", &img("twofaces-crowd"))],
    );
    let (status, body) = send(
        &app.router,
        multipart_request("/v1/faces/register", Some(&key), body),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "MULTIPLE_FACES");

    // No row, and the fetch 404s.
    let request = Request::builder()
        .uri("/v1/faces/crowd")
        .header("x-api-key", &key)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn audit_rows_bounded_by_enqueues_and_drops() {
    let app = test_app();
    let (_, key) = seed_tenant(&app, json!({ "search_rate_limit": 0 }));
    let image = img("person-alice");

    let total = 25;
    for _ in 0..total {
        let body = multipart_body(&[], &[("image", &image)]);
        let (status, _) = send(
            &app.router,
            multipart_request("/v1/faces/search", Some(&key), body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    app.search_audit.stop().await;

    let persisted = app.store.search_audits().len() as u64;
    let dropped = app.search_audit.dropped();
    assert!(persisted <= total);
    assert!(persisted >= total - dropped);
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let app = test_app();
    let (_, key_a) = seed_tenant(&app, json!({}));
    let (_, key_b) = seed_tenant(&app, json!({}));
    let image = img("person-shared");

    // Tenant A registers a subject; tenant B searches the same image.
    let body = multipart_body(&[("external_id", "subject")], &[("image", &image)]);
    send(
        &app.router,
        multipart_request("/v1/faces/register", Some(&key_a), body),
    )
    .await;

    let body = multipart_body(&[], &[("image", &image)]);
    let (status, body) = send(
        &app.router,
        multipart_request("/v1/faces/search", Some(&key_b), body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["matches"].as_array().unwrap().is_empty());

    // And tenant B cannot fetch it either.
    let request = Request::builder()
        .uri("/v1/faces/subject")
        .header("x-api-key", &key_b)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
