// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds in-memory server resources and drives the router with oneshot requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `user_auth_server`

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use tower::ServiceExt;
use url::Url;
use user_auth_server::{
    config::{DatabaseUrl, ServerConfig},
    database::{MemoryStore, Storage},
    errors::{AppError, AppResult},
    key_management::SigningKeyPair,
    notifications::{InviteNotification, NoopNotifier, Notifier},
    resources::ServerResources,
    routes,
};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Public base URL used in test magic links
pub const TEST_BASE_URL: &str = "https://auth.example.com";

/// Configuration for an in-memory test server
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database: DatabaseUrl::Memory,
        public_base_url: TEST_BASE_URL.to_owned(),
        ..ServerConfig::default()
    }
}

/// Server resources over a fresh `MemoryStore` with a no-op notifier
pub fn create_test_resources() -> Arc<ServerResources> {
    create_test_resources_with_notifier(Arc::new(NoopNotifier))
}

/// Server resources over a fresh `MemoryStore` with the given notifier
pub fn create_test_resources_with_notifier(notifier: Arc<dyn Notifier>) -> Arc<ServerResources> {
    create_test_resources_with_config(test_config(), notifier)
}

/// Server resources over a fresh `MemoryStore` with explicit configuration
pub fn create_test_resources_with_config(
    config: ServerConfig,
    notifier: Arc<dyn Notifier>,
) -> Arc<ServerResources> {
    init_test_logging();
    let storage = Storage::from_backend(Arc::new(MemoryStore::new()));
    let signing_key = Arc::new(SigningKeyPair::generate().unwrap());
    Arc::new(ServerResources::new(
        Arc::new(config),
        storage,
        signing_key,
        notifier,
    ))
}

/// Router over `resources`
pub fn test_router(resources: &Arc<ServerResources>) -> Router {
    routes::router(resources.clone())
}

/// Response status, headers, and JSON body (`Value::Null` when empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Parsed `Location` header
    pub fn location(&self) -> Url {
        let location = self
            .headers
            .get(header::LOCATION)
            .expect("response has a Location header")
            .to_str()
            .unwrap();
        Url::parse(location).unwrap()
    }

    /// Query parameters of the `Location` header
    pub fn location_params(&self) -> HashMap<String, String> {
        self.location().query_pairs().into_owned().collect()
    }
}

/// Send one request through the router
pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

/// POST a urlencoded form
pub async fn post_form(app: &Router, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
    let body = serde_urlencoded::to_string(fields).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

/// POST a JSON body with optional extra headers
pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &Value,
    extra_headers: &[(&str, &str)],
) -> TestResponse {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    send(app, request).await
}

/// GET with optional extra headers
pub async fn get(app: &Router, uri: &str, extra_headers: &[(&str, &str)]) -> TestResponse {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

/// Register a client over HTTP and return its generated secret
pub async fn register_client(app: &Router, client_id: &str, redirect_uri: Option<&str>) -> String {
    let mut body = serde_json::json!({ "client_id": client_id });
    if let Some(uri) = redirect_uri {
        body["redirect_uri"] = Value::String(uri.to_owned());
    }
    let response = post_json(app, "/register-client", &body, &[]).await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body["client_secret"].as_str().unwrap().to_owned()
}

/// Run `/authorize` and return the issued code
pub async fn authorize(app: &Router, client_id: &str, redirect_uri: &str) -> String {
    let uri = format!(
        "/authorize?{}",
        serde_urlencoded::to_string([
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
        ])
        .unwrap()
    );
    let response = get(app, &uri, &[]).await;
    assert_eq!(response.status, StatusCode::FOUND, "{:?}", response.body);
    response.location_params()["code"].clone()
}

/// Notifier that records every invite it is handed
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<InviteNotification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_invite(&self, notification: &InviteNotification) -> AppResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Notifier whose downstream service is always failing
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_invite(&self, _notification: &InviteNotification) -> AppResult<()> {
        Err(AppError::external_service("notifications", "service unavailable"))
    }
}

/// Notifier that never answers
pub struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    async fn send_invite(&self, _notification: &InviteNotification) -> AppResult<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
