// ABOUTME: OAuth 2.0 route handlers: client registration, authorize, callback, and token endpoints
// ABOUTME: Also serves the JWKS document for the active signing key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! OAuth 2.0 server routes

use crate::errors::AppError;
use crate::oauth2_server::{
    AuthorizeRequest, CallbackQuery, ClientCredentialsRequest, ClientRegistrationRequest,
    OAuth2Error, TokenRequest,
};
use crate::resources::ServerResources;
use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use std::sync::Arc;
use tracing::debug;

/// OAuth 2.0 routes
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create all OAuth 2.0 routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/oauth/token", post(Self::handle_client_credentials))
            .route("/register-client", post(Self::handle_register_client))
            .route("/authorize", get(Self::handle_authorize))
            .route("/callback", get(Self::handle_callback))
            .route("/token", post(Self::handle_token))
            .route("/.well-known/jwks.json", get(Self::handle_jwks))
            .with_state(resources)
    }

    /// Issue an access token for client credentials
    async fn handle_client_credentials(
        State(resources): State<Arc<ServerResources>>,
        form: Result<Form<ClientCredentialsRequest>, FormRejection>,
    ) -> Result<Response, AppError> {
        let Form(request) = form.map_err(|e| {
            debug!(error = %e, "Rejected client credentials form");
            AppError::invalid_input("client_id and client_secret are required")
        })?;

        let response = resources.flow.client_credentials_token(request).await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Register a client and return its one-time secret
    async fn handle_register_client(
        State(resources): State<Arc<ServerResources>>,
        body: Result<Json<ClientRegistrationRequest>, JsonRejection>,
    ) -> Result<Response, AppError> {
        let Json(request) = body.map_err(|_| AppError::invalid_input("Invalid request format"))?;

        let response = resources.flow.register_client(request).await?;
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Issue an authorization code by redirecting to the client
    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        query: Result<Query<AuthorizeRequest>, QueryRejection>,
    ) -> Result<Response, OAuth2Error> {
        let Query(request) = query
            .map_err(|_| OAuth2Error::invalid_request("Invalid authorization request"))?;

        let redirect = resources.flow.authorize(request).await?;
        Ok((StatusCode::FOUND, [(header::LOCATION, redirect.to_string())]).into_response())
    }

    /// Echo a delivered authorization code
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        query: Result<Query<CallbackQuery>, QueryRejection>,
    ) -> Result<Response, AppError> {
        let code = query.map(|Query(q)| q.code).unwrap_or_default();

        let response = resources.flow.callback(&code)?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Redeem an authorization code or refresh token
    async fn handle_token(
        State(resources): State<Arc<ServerResources>>,
        form: Result<Form<TokenRequest>, FormRejection>,
    ) -> Result<Response, OAuth2Error> {
        let Form(request) =
            form.map_err(|_| OAuth2Error::invalid_request("Invalid token request"))?;

        let response = resources.flow.exchange_token(request).await?;
        Ok((
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store")],
            Json(response),
        )
            .into_response())
    }

    /// Publish the active verification key
    async fn handle_jwks(State(resources): State<Arc<ServerResources>>) -> Response {
        (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "public, max-age=3600")],
            Json(resources.signing_key.jwks()),
        )
            .into_response()
    }
}
