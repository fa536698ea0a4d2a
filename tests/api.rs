// HTTP API tests: the full router against an in-memory store and a fake
// classifier. No network access.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use imgmod::classifier::traits::{CategorySeverity, ImageClassifier};
use imgmod::config::Config;
use imgmod::db::sqlite::SqliteDatabase;
use imgmod::db::Database;
use imgmod::tokens::create_token;
use imgmod::web::{build_router, AppState};

struct FixedClassifier(Vec<CategorySeverity>);

#[async_trait]
impl ImageClassifier for FixedClassifier {
    async fn analyze_image(&self, _image: &[u8]) -> anyhow::Result<Vec<CategorySeverity>> {
        Ok(self.0.clone())
    }
}

struct FailingClassifier;

#[async_trait]
impl ImageClassifier for FailingClassifier {
    async fn analyze_image(&self, _image: &[u8]) -> anyhow::Result<Vec<CategorySeverity>> {
        anyhow::bail!("401 Unauthorized (InvalidSubscriptionKey): bad key")
    }
}

struct Harness {
    app: Router,
    db: Arc<dyn Database>,
    admin: String,
    user: String,
}

async fn harness_with(classifier: Arc<dyn ImageClassifier>) -> Harness {
    harness_with_config(Config::default(), classifier).await
}

async fn harness_with_config(config: Config, classifier: Arc<dyn ImageClassifier>) -> Harness {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let admin = create_token(db.as_ref(), true).await.unwrap().token;
    let user = create_token(db.as_ref(), false).await.unwrap().token;
    let state = AppState::new(config, db.clone(), classifier);
    Harness {
        app: build_router(state),
        db,
        admin,
        user,
    }
}

async fn harness() -> Harness {
    harness_with(Arc::new(FixedClassifier(vec![
        CategorySeverity::new("Hate", 0),
        CategorySeverity::new("SelfHarm", 0),
        CategorySeverity::new("Sexual", 2),
        CategorySeverity::new("Violence", 4),
    ])))
    .await
}

fn request(method: Method, uri: &str, auth: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(body).unwrap()
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn multipart_request(auth: Option<&str>, field: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "imgmod-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"cat.png\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/moderate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        );
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

// ============================================================
// Authorization gate
// ============================================================

#[tokio::test]
async fn missing_header_is_unauthorized() {
    let h = harness().await;
    let (status, body) = send(&h.app, request(Method::GET, "/auth/tokens", None, Body::empty())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token");
}

#[tokio::test]
async fn unknown_and_malformed_tokens_are_unauthorized() {
    let h = harness().await;
    for auth in ["Bearer not-a-real-token", "Basic dXNlcjpwYXNz", "Bearer", "garbage"] {
        let (status, _) = send(
            &h.app,
            request(Method::GET, "/auth/tokens", Some(auth), Body::empty()),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {auth:?}");
    }
}

#[tokio::test]
async fn unknown_token_on_moderate_is_unauthorized() {
    let h = harness().await;
    let (status, _) = send(
        &h.app,
        multipart_request(Some("Bearer nope"), "file", b"png"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn regular_token_on_admin_routes_is_forbidden() {
    let h = harness().await;
    let auth = bearer(&h.user);

    let (status, body) = send(
        &h.app,
        request(Method::GET, "/auth/tokens", Some(&auth), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Admin access needed for this action");

    let (status, _) = send(
        &h.app,
        request(Method::POST, "/auth/tokens", Some(&auth), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Privilege is checked before the target is looked up
    let (status, _) = send(
        &h.app,
        request(
            Method::DELETE,
            "/auth/tokens/does-not-exist",
            Some(&auth),
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================
// Token administration
// ============================================================

#[tokio::test]
async fn admin_creates_admin_token() {
    let h = harness().await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/auth/tokens")
        .header(header::AUTHORIZATION, bearer(&h.admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"is_admin": true}"#))
        .unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], true);
    let value = body["token"].as_str().unwrap();
    assert_eq!(value.len(), 64);
    assert!(body["created_at"].is_string());

    // The new token works immediately
    let (status, _) = send(
        &h.app,
        request(Method::GET, "/auth/tokens", Some(&bearer(value)), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn create_defaults_to_regular_token() {
    let h = harness().await;

    let empty_object = Request::builder()
        .method(Method::POST)
        .uri("/auth/tokens")
        .header(header::AUTHORIZATION, bearer(&h.admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(&h.app, empty_object).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], false);

    let no_body = request(
        Method::POST,
        "/auth/tokens",
        Some(&bearer(&h.admin)),
        Body::empty(),
    );
    let (status, body) = send(&h.app, no_body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], false);
}

#[tokio::test]
async fn admin_lists_tokens() {
    let h = harness().await;
    let (status, body) = send(
        &h.app,
        request(Method::GET, "/auth/tokens", Some(&bearer(&h.admin)), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tokens = body.as_array().unwrap();
    assert_eq!(tokens.len(), 2);
    assert!(tokens.iter().any(|t| t["token"] == h.user.as_str() && t["is_admin"] == false));
}

#[tokio::test]
async fn delete_twice_second_is_not_found() {
    let h = harness().await;
    let uri = format!("/auth/tokens/{}", h.user);
    let auth = bearer(&h.admin);

    let (status, body) = send(&h.app, request(Method::DELETE, &uri, Some(&auth), Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Token deleted successfully");

    let (status, body) = send(&h.app, request(Method::DELETE, &uri, Some(&auth), Body::empty())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Token not found");

    // The revoked token no longer authenticates
    let (status, _) = send(&h.app, multipart_request(Some(&bearer(&h.user)), "file", b"png")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================
// Moderation
// ============================================================

#[tokio::test]
async fn moderate_returns_verdict_and_records_usage() {
    let h = harness().await;
    let (status, body) = send(&h.app, multipart_request(Some(&bearer(&h.user)), "file", b"png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_safe"], false);
    assert_eq!(body["categories"]["violence"], 4);
    assert_eq!(body["categories"]["sexual"], 2);
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((confidence - (1.0 - 4.0 / 7.0)).abs() < 1e-12);

    let usage = h.db.recent_usage(10).await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].token, h.user);
    assert_eq!(usage[0].endpoint, "/moderate");
}

#[tokio::test]
async fn admin_token_can_moderate() {
    let h = harness().await;
    let (status, _) = send(&h.app, multipart_request(Some(&bearer(&h.admin)), "file", b"png")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn moderate_without_auth_records_nothing() {
    let h = harness().await;
    let (status, _) = send(&h.app, multipart_request(None, "file", b"png")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.db.recent_usage(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn moderate_missing_file_field_is_bad_request() {
    let h = harness().await;
    let (status, body) = send(&h.app, multipart_request(Some(&bearer(&h.user)), "image", b"png")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("file"));
    assert!(h.db.recent_usage(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn classifier_failure_is_500_without_usage() {
    let h = harness_with(Arc::new(FailingClassifier)).await;
    let (status, body) = send(&h.app, multipart_request(Some(&bearer(&h.user)), "file", b"png")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Content Safety API error"), "got {detail}");
    assert!(h.db.recent_usage(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn out_of_range_severity_is_500() {
    let h = harness_with(Arc::new(FixedClassifier(vec![CategorySeverity::new(
        "Hate", 9,
    )])))
    .await;
    let (status, _) = send(&h.app, multipart_request(Some(&bearer(&h.user)), "file", b"png")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(h.db.recent_usage(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_classifier_result_is_safe() {
    let h = harness_with(Arc::new(FixedClassifier(vec![]))).await;
    let (status, body) = send(&h.app, multipart_request(Some(&bearer(&h.user)), "file", b"png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_safe"], true);
    assert_eq!(body["confidence"], 1.0);
}

async fn small_limit_harness() -> Harness {
    let config = Config {
        max_upload_bytes: 1024,
        ..Config::default()
    };
    harness_with_config(config, Arc::new(FixedClassifier(vec![]))).await
}

#[tokio::test]
async fn oversized_upload_is_413_without_usage() {
    let h = small_limit_harness().await;
    let image = vec![0u8; 4096];
    let (status, body) = send(&h.app, multipart_request(Some(&bearer(&h.user)), "file", &image)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["detail"], "Upload exceeds the 1024 byte limit");
    assert!(h.db.recent_usage(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_upload_with_unknown_token_is_401() {
    let h = small_limit_harness().await;
    let image = vec![0u8; 4096];
    let (status, body) = send(&h.app, multipart_request(Some("Bearer nope"), "file", &image)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token");
}

#[tokio::test]
async fn upload_under_limit_is_accepted() {
    let h = small_limit_harness().await;
    let (status, _) = send(&h.app, multipart_request(Some(&bearer(&h.user)), "file", &[0u8; 10])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.db.recent_usage(10).await.unwrap().len(), 1);
}

// ============================================================
// Public routes
// ============================================================

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let h = harness().await;
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/moderate")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    for method in ["GET", "POST", "DELETE"] {
        assert!(methods.contains(method), "missing {method} in {methods}");
    }
}

#[tokio::test]
async fn health_needs_no_token() {
    let h = harness().await;
    let (status, body) = send(&h.app, request(Method::GET, "/health", None, Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
