// ABOUTME: User account route handlers: login, signup, token verification, and invite lookup
// ABOUTME: Login and signup answer with a redirect carrying freshly minted tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::headers::CLIENT_ID;
use crate::errors::AppError;
use crate::middleware::BearerClaims;
use crate::oauth2_server::{LoginRequest, SignupRequest, VerifyTokenResponse};
use crate::resources::ServerResources;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use url::Url;

/// Account routes
pub struct AccountRoutes;

impl AccountRoutes {
    /// Create all account routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/login", post(Self::handle_login))
            .route("/signup", post(Self::handle_signup))
            .route("/verify-token", get(Self::handle_verify_token))
            .route("/invite/:invite_id", get(Self::handle_invite))
            .with_state(resources)
    }

    fn client_id(headers: &HeaderMap) -> Option<&str> {
        headers.get(CLIENT_ID).and_then(|h| h.to_str().ok())
    }

    fn redirect(location: &Url) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
    }

    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Result<Json<LoginRequest>, JsonRejection>,
    ) -> Result<Response, AppError> {
        let Json(request) = body.map_err(|_| AppError::invalid_input("Invalid request format"))?;

        let location = resources
            .flow
            .login(Self::client_id(&headers), request)
            .await?;
        Ok(Self::redirect(&location))
    }

    async fn handle_signup(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Result<Json<SignupRequest>, JsonRejection>,
    ) -> Result<Response, AppError> {
        let Json(request) = body.map_err(|_| AppError::invalid_input("Invalid request format"))?;

        let location = resources
            .flow
            .sign_up(Self::client_id(&headers), request)
            .await?;
        Ok(Self::redirect(&location))
    }

    async fn handle_verify_token(BearerClaims(claims): BearerClaims) -> Json<VerifyTokenResponse> {
        Json(VerifyTokenResponse {
            message: "Token is valid".to_owned(),
            claims,
        })
    }

    async fn handle_invite(
        State(resources): State<Arc<ServerResources>>,
        _auth: BearerClaims,
        Path(invite_id): Path<String>,
    ) -> Result<Response, AppError> {
        let response = resources.flow.check_invite(&invite_id).await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}
