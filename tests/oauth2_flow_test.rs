// ABOUTME: End-to-end tests for the OAuth endpoints through the axum router
// ABOUTME: Covers registration, authorize, callback, code exchange, refresh, and JWKS
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use axum::http::StatusCode;
use common::{
    authorize, create_test_resources, get, post_form, post_json, register_client, test_router,
};
use jsonwebtoken::{jwk::Jwk, Algorithm, DecodingKey, Validation};
use serde_json::json;
use user_auth_server::{
    auth::TokenUse,
    models::{NewClient, NewUser, UserProfile},
};

#[tokio::test]
async fn test_register_authorize_exchange_login_scenario() {
    let resources = create_test_resources();
    let app = test_router(&resources);

    let registry = &resources.client_registry;
    let rejected = registry
        .register_client(NewClient {
            client_id: "acme".to_owned(),
            client_secret: String::new(),
            redirect_uri: None,
        })
        .await
        .unwrap();
    assert!(!rejected);
    let registered = registry
        .register_client(NewClient {
            client_id: "acme".to_owned(),
            client_secret: "s3cret".to_owned(),
            redirect_uri: None,
        })
        .await
        .unwrap();
    assert!(registered);

    let code = authorize(&app, "acme", "https://x/cb").await;
    assert!(code.len() >= 20);

    let exchange = post_form(
        &app,
        "/token",
        &[
            ("client_id", "acme"),
            ("client_secret", "s3cret"),
            ("code", code.as_str()),
        ],
    )
    .await;
    assert_eq!(exchange.status, StatusCode::OK, "{:?}", exchange.body);
    assert!(!exchange.body["access_token"].as_str().unwrap().is_empty());
    assert_eq!(exchange.body["token_type"], "Bearer");
    assert_eq!(exchange.body["expires_in"], 3600);
    assert!(exchange.body["refresh_token"].is_string());

    resources
        .storage
        .users
        .create_user(NewUser {
            email: "ada@example.com".to_owned(),
            password: "correct horse".to_owned(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            profile: UserProfile::default(),
        })
        .await
        .unwrap();

    let login = post_json(
        &app,
        "/login",
        &json!({
            "email": "ada@example.com",
            "password": "battery staple",
            "redirect_uri": "https://x/cb"
        }),
        &[("Client-Id", "acme")],
    )
    .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    assert_eq!(login.body, json!({ "error": "Unauthorized" }));
}

#[tokio::test]
async fn test_exchanged_access_token_verifies() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let secret = register_client(&app, "acme", Some("https://x/cb")).await;
    let code = authorize(&app, "acme", "https://x/cb").await;

    let exchange = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("client_id", "acme"),
            ("client_secret", secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", "https://x/cb"),
        ],
    )
    .await;
    assert_eq!(exchange.status, StatusCode::OK);

    let token = exchange.body["access_token"].as_str().unwrap();
    let claims = resources.token_manager.verify_token(token).unwrap();
    assert_eq!(claims.aud, "acme");
    assert_eq!(claims.iss, resources.token_manager.issuer());
    assert_eq!(claims.token_use, TokenUse::Access);
    assert!(claims.exp > claims.iat);
}

#[tokio::test]
async fn test_code_is_single_use() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let secret = register_client(&app, "acme", None).await;
    let code = authorize(&app, "acme", "https://x/cb").await;
    let form = [
        ("client_id", "acme"),
        ("client_secret", secret.as_str()),
        ("code", code.as_str()),
    ];

    let first = post_form(&app, "/token", &form).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = post_form(&app, "/token", &form).await;
    assert_eq!(second.status, StatusCode::UNAUTHORIZED);
    assert_eq!(second.body["error"], "invalid_client");
}

#[tokio::test]
async fn test_wrong_secret_does_not_burn_code() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let secret = register_client(&app, "acme", None).await;
    let code = authorize(&app, "acme", "https://x/cb").await;

    let wrong = post_form(
        &app,
        "/token",
        &[
            ("client_id", "acme"),
            ("client_secret", "not-the-secret"),
            ("code", code.as_str()),
        ],
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let right = post_form(
        &app,
        "/token",
        &[("client_id", "acme"), ("client_secret", secret.as_str()), ("code", code.as_str())],
    )
    .await;
    assert_eq!(right.status, StatusCode::OK);
}

#[tokio::test]
async fn test_code_from_another_client_rejected() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    register_client(&app, "acme", None).await;
    let other_secret = register_client(&app, "globex", None).await;
    let code = authorize(&app, "acme", "https://x/cb").await;

    let response = post_form(
        &app,
        "/token",
        &[
            ("client_id", "globex"),
            ("client_secret", other_secret.as_str()),
            ("code", code.as_str()),
        ],
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "invalid_client");
}

#[tokio::test]
async fn test_exchange_failures_are_symmetric() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let secret = register_client(&app, "acme", None).await;
    let code = authorize(&app, "acme", "https://x/cb").await;

    let unknown_client = post_form(
        &app,
        "/token",
        &[("client_id", "nobody"), ("client_secret", secret.as_str()), ("code", code.as_str())],
    )
    .await;
    let unknown_code = post_form(
        &app,
        "/token",
        &[("client_id", "acme"), ("client_secret", secret.as_str()), ("code", "bogus-code")],
    )
    .await;

    assert_eq!(unknown_client.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_code.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_client.body, unknown_code.body);
}

#[tokio::test]
async fn test_exchange_rejects_mismatched_redirect_uri() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let secret = register_client(&app, "acme", None).await;
    let code = authorize(&app, "acme", "https://x/cb").await;

    let response = post_form(
        &app,
        "/token",
        &[
            ("client_id", "acme"),
            ("client_secret", secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", "https://evil.example.com/cb"),
        ],
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_exchange_input_validation() {
    let resources = create_test_resources();
    let app = test_router(&resources);

    let missing_code = post_form(
        &app,
        "/token",
        &[("client_id", "acme"), ("client_secret", "s3cret")],
    )
    .await;
    assert_eq!(missing_code.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing_code.body["error"], "invalid_request");

    let bad_grant = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "password"),
            ("client_id", "acme"),
            ("client_secret", "s3cret"),
        ],
    )
    .await;
    assert_eq!(bad_grant.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_grant.body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_refresh_grant() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let secret = register_client(&app, "acme", None).await;
    let code = authorize(&app, "acme", "https://x/cb").await;
    let exchange = post_form(
        &app,
        "/token",
        &[("client_id", "acme"), ("client_secret", secret.as_str()), ("code", code.as_str())],
    )
    .await;
    let refresh_token = exchange.body["refresh_token"].as_str().unwrap().to_owned();
    let access_token = exchange.body["access_token"].as_str().unwrap().to_owned();

    let refreshed = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "refresh_token"),
            ("client_id", "acme"),
            ("client_secret", secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ],
    )
    .await;
    assert_eq!(refreshed.status, StatusCode::OK, "{:?}", refreshed.body);
    assert!(refreshed.body["access_token"].is_string());
    assert!(refreshed.body.get("refresh_token").is_none());

    let with_access_token = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "refresh_token"),
            ("client_id", "acme"),
            ("client_secret", secret.as_str()),
            ("refresh_token", access_token.as_str()),
        ],
    )
    .await;
    assert_eq!(with_access_token.status, StatusCode::UNAUTHORIZED);
    assert_eq!(with_access_token.body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_refresh_token_bound_to_client() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let other_secret = register_client(&app, "globex", None).await;
    let refresh_token = resources.token_manager.issue_refresh_token("acme").unwrap();

    let response = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "refresh_token"),
            ("client_id", "globex"),
            ("client_secret", other_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ],
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorize_validation() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    register_client(&app, "acme", Some("https://x/cb")).await;

    let wrong_type = get(
        &app,
        "/authorize?client_id=acme&redirect_uri=https%3A%2F%2Fx%2Fcb&response_type=token",
        &[],
    )
    .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_type.body["error"], "unsupported_response_type");

    let missing = get(&app, "/authorize?client_id=acme&response_type=code", &[]).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"], "invalid_request");

    let unknown = get(
        &app,
        "/authorize?client_id=nobody&redirect_uri=https%3A%2F%2Fx%2Fcb&response_type=code",
        &[],
    )
    .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body["error"], "invalid_client");

    let mismatched = get(
        &app,
        "/authorize?client_id=acme&redirect_uri=https%3A%2F%2Fx%2Fother&response_type=code",
        &[],
    )
    .await;
    assert_eq!(mismatched.status, StatusCode::BAD_REQUEST);
    assert_eq!(mismatched.body["error"], "invalid_client");
}

#[tokio::test]
async fn test_authorize_preserves_redirect_query_and_state() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    register_client(&app, "acme", Some("https://x/cb?tenant=7")).await;

    let response = get(
        &app,
        "/authorize?client_id=acme&redirect_uri=https%3A%2F%2Fx%2Fcb%3Ftenant%3D7&response_type=code&state=xyz",
        &[],
    )
    .await;
    assert_eq!(response.status, StatusCode::FOUND);

    let location = response.location();
    assert_eq!(location.host_str(), Some("x"));
    assert_eq!(location.path(), "/cb");
    let params = response.location_params();
    assert_eq!(params["tenant"], "7");
    assert_eq!(params["state"], "xyz");
    assert!(params["code"].len() >= 20);
}

#[tokio::test]
async fn test_unregistered_redirect_is_bound_on_first_authorize() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    register_client(&app, "acme", None).await;

    authorize(&app, "acme", "https://x/cb").await;
    authorize(&app, "acme", "https://x/cb").await;

    let hijack = get(
        &app,
        "/authorize?client_id=acme&redirect_uri=https%3A%2F%2Fevil.example.com%2Fcb&response_type=code",
        &[],
    )
    .await;
    assert_eq!(hijack.status, StatusCode::BAD_REQUEST);
    assert_eq!(hijack.body["error"], "invalid_client");

    let client = resources.client_registry.get_client_by_id("acme").await.unwrap();
    assert_eq!(client.redirect_uri.as_deref(), Some("https://x/cb"));
}

#[tokio::test]
async fn test_callback_does_not_consume_code() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let secret = register_client(&app, "acme", None).await;
    let code = authorize(&app, "acme", "https://x/cb").await;

    let callback = get(&app, &format!("/callback?code={code}"), &[]).await;
    assert_eq!(callback.status, StatusCode::OK);
    assert_eq!(callback.body["message"], "Authorization successful");
    assert_eq!(callback.body["authorization_code"], code.as_str());

    let missing = get(&app, "/callback", &[]).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let exchange = post_form(
        &app,
        "/token",
        &[("client_id", "acme"), ("client_secret", secret.as_str()), ("code", code.as_str())],
    )
    .await;
    assert_eq!(exchange.status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_client_endpoint() {
    let resources = create_test_resources();
    let app = test_router(&resources);

    let created = post_json(&app, "/register-client", &json!({ "client_id": "acme" }), &[]).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["client_id"], "acme");
    assert!(created.body["client_secret"].as_str().unwrap().len() >= 32);

    let duplicate =
        post_json(&app, "/register-client", &json!({ "client_id": "acme" }), &[]).await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body, json!({ "error": "Client already exists" }));

    let missing = post_json(&app, "/register-client", &json!({}), &[]).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let bad_redirect = post_json(
        &app,
        "/register-client",
        &json!({ "client_id": "globex", "redirect_uri": "not a url" }),
        &[],
    )
    .await;
    assert_eq!(bad_redirect.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_client_credentials_token() {
    let resources = create_test_resources();
    let app = test_router(&resources);
    let secret = register_client(&app, "acme", None).await;

    let issued = post_form(
        &app,
        "/oauth/token",
        &[("client_id", "acme"), ("client_secret", secret.as_str())],
    )
    .await;
    assert_eq!(issued.status, StatusCode::OK);
    let token = issued.body["token"].as_str().unwrap();
    let claims = resources.token_manager.verify_token(token).unwrap();
    assert_eq!(claims.sub, "client:acme");

    let wrong = post_form(
        &app,
        "/oauth/token",
        &[("client_id", "acme"), ("client_secret", "nope")],
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, json!({ "error": "Unauthorized" }));

    let missing = post_form(&app, "/oauth/token", &[("client_id", "acme")]).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_jwks_verifies_issued_tokens() {
    let resources = create_test_resources();
    let app = test_router(&resources);

    let response = get(&app, "/.well-known/jwks.json", &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    let jwk_json = &response.body["keys"][0];
    assert_eq!(jwk_json["kid"], resources.signing_key.key_id());

    let jwk: Jwk = serde_json::from_value(jwk_json.clone()).unwrap();
    let decoding_key = DecodingKey::from_jwk(&jwk).unwrap();
    let token = resources.token_manager.issue_access_token("acme").unwrap();

    let mut validation = Validation::new(Algorithm::ES256);
    validation.set_audience(&["acme"]);
    let decoded =
        jsonwebtoken::decode::<serde_json::Value>(&token, &decoding_key, &validation).unwrap();
    assert_eq!(decoded.claims["aud"], "acme");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let resources = create_test_resources();
    let app = test_router(&resources);

    let response = get(&app, "/callback?code=abc", &[("x-request-id", "req-123")]).await;
    assert_eq!(response.headers["x-request-id"], "req-123");

    let generated = get(&app, "/callback?code=abc", &[]).await;
    assert!(generated.headers.contains_key("x-request-id"));
}
