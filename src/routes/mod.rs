// ABOUTME: Route module organization for the authorization server's HTTP endpoints
// ABOUTME: Assembles domain routers and applies request tracing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! HTTP routes, grouped by domain. Handlers stay thin and delegate to
//! [`crate::oauth2_server::AuthorizationFlow`].

/// Login, signup, token verification, and invites
pub mod accounts;
/// OAuth 2.0 client and token endpoints
pub mod oauth2;

pub use accounts::AccountRoutes;
pub use oauth2::OAuth2Routes;

use crate::middleware::with_request_tracing;
use crate::resources::ServerResources;
use axum::Router;
use std::sync::Arc;

/// Build the complete application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    let app = Router::new()
        .merge(OAuth2Routes::routes(resources.clone()))
        .merge(AccountRoutes::routes(resources));

    with_request_tracing(app)
}
