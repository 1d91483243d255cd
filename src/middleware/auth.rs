// ABOUTME: Bearer token authentication for axum handlers
// ABOUTME: Extracts the Authorization header and verifies it against the deployment key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::auth::Claims;
use crate::constants::headers::BEARER_PREFIX;
use crate::errors::AppError;
use crate::resources::ServerResources;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::debug;

/// Pull the raw token out of `Authorization: Bearer <token>`
///
/// # Errors
///
/// Returns `InvalidInput` when the header is missing, not UTF-8, or not a
/// bearer credential
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::invalid_input("Authorization header is required"))?;

    value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::invalid_input("Authorization header must use the Bearer scheme"))
}

/// Claims of a verified bearer token
#[derive(Debug, Clone)]
pub struct BearerClaims(pub Claims);

#[async_trait]
impl FromRequestParts<Arc<ServerResources>> for BearerClaims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        resources: &Arc<ServerResources>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = resources.flow.verify_token(token)?;
        debug!(sub = %claims.sub, aud = %claims.aud, "Authenticated bearer token");
        Ok(Self(claims))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }
}
