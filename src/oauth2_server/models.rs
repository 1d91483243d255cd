// ABOUTME: Request and response shapes for the OAuth endpoints and the login/signup shortcuts
// ABOUTME: OAuth2Error carries the RFC 6749 error vocabulary together with its HTTP status
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::auth::Claims;
use crate::errors::{AppError, ErrorCode};
use crate::models::{Invite, UserProfile};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Form body of `POST /oauth/token`
#[derive(Debug, Default, Deserialize)]
pub struct ClientCredentialsRequest {
    /// Client identifier
    #[serde(default)]
    pub client_id: String,
    /// Client secret
    #[serde(default)]
    pub client_secret: String,
}

/// Response of `POST /oauth/token`
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientCredentialsResponse {
    /// Access token for the client
    pub token: String,
}

/// JSON body of `POST /register-client`
#[derive(Debug, Default, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Requested client identifier
    #[serde(default)]
    pub client_id: String,
    /// Redirect URI accepted by `/authorize`
    pub redirect_uri: Option<String>,
}

/// Response of `POST /register-client`; the only time the secret is shown
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    /// Registered client identifier
    pub client_id: String,
    /// Server-generated client secret
    pub client_secret: String,
}

/// Query of `GET /authorize`
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuthorizeRequest {
    /// Must be `code`
    #[serde(default)]
    pub response_type: String,
    /// Client identifier
    #[serde(default)]
    pub client_id: String,
    /// Where the code is delivered
    #[serde(default)]
    pub redirect_uri: String,
    /// Opaque value echoed back to the client
    pub state: Option<String>,
}

/// Query of `GET /callback`
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code delivered by `/authorize`
    #[serde(default)]
    pub code: String,
}

/// Response of `GET /callback`
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    /// Fixed confirmation
    pub message: String,
    /// The code, echoed back unconsumed
    pub authorization_code: String,
}

/// Form body of `POST /token`
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    /// `authorization_code` (default) or `refresh_token`
    pub grant_type: Option<String>,
    /// Client identifier
    #[serde(default)]
    pub client_id: String,
    /// Client secret
    #[serde(default)]
    pub client_secret: String,
    /// Authorization code, for the `authorization_code` grant
    pub code: Option<String>,
    /// Redirect URI the code was delivered to; checked when present
    pub redirect_uri: Option<String>,
    /// Refresh token, for the `refresh_token` grant
    pub refresh_token: Option<String>,
}

/// Response of `POST /token`
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token (JWT)
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Refresh token, on the `authorization_code` grant only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// JSON body of `POST /login`
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Plaintext password
    #[serde(default)]
    pub password: String,
    /// Where the tokens are delivered
    #[serde(default)]
    pub redirect_uri: String,
}

/// JSON body of `POST /signup`
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Plaintext password
    #[serde(default)]
    pub password: String,
    /// Given name
    #[serde(default)]
    pub first_name: String,
    /// Family name
    #[serde(default)]
    pub last_name: String,
    /// `user_type`, `professional_type`, `zip`, and `phone`
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Where the tokens are delivered
    #[serde(default)]
    pub redirect_uri: String,
}

/// Tokens minted by login and signup, delivered as redirect query parameters
#[derive(Debug, Clone)]
pub struct UserTokens {
    /// Access token for the calling client
    pub access_token: String,
    /// ID token describing the user
    pub id_token: String,
    /// Refresh token for the calling client
    pub refresh_token: String,
}

/// Response of `GET /verify-token`
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    /// Fixed confirmation
    pub message: String,
    /// Verified claims
    pub claims: Claims,
}

/// Response of `GET /invite/{invite_id}`
#[derive(Debug, Serialize, Deserialize)]
pub struct InviteResponse {
    /// Fixed confirmation
    pub message: String,
    /// The invite
    pub invite: Invite,
}

/// OAuth 2.0 error body with its HTTP status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuth2Error {
    /// RFC 6749 error code
    pub error: String,
    /// Human-readable description
    pub message: String,
    #[serde(skip)]
    status: StatusCode,
}

impl OAuth2Error {
    fn new(status: StatusCode, error: &str, message: &str) -> Self {
        Self {
            error: error.to_owned(),
            message: message.to_owned(),
            status,
        }
    }

    /// Malformed or incomplete request
    #[must_use]
    pub fn invalid_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    /// Unknown client or mismatched redirect URI at `/authorize`
    #[must_use]
    pub fn invalid_client_request() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_client",
            "Client ID or Redirect URI is invalid.",
        )
    }

    /// Client authentication failed at the token endpoint
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            "Client authentication failed",
        )
    }

    /// Code or refresh token rejected
    #[must_use]
    pub fn invalid_grant(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_grant", message)
    }

    /// Grant type other than `authorization_code` or `refresh_token`
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "Grant type not supported",
        )
    }

    /// Response type other than `code`
    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unsupported_response_type",
            "Invalid response type, expected 'code'.",
        )
    }

    /// Storage or crypto failure; details stay in the logs
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "The server encountered an unexpected condition",
        )
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AppError> for OAuth2Error {
    fn from(error: AppError) -> Self {
        match error.code {
            ErrorCode::InvalidInput | ErrorCode::MissingRequiredField => {
                Self::invalid_request(&error.message)
            }
            ErrorCode::AuthRequired
            | ErrorCode::AuthInvalid
            | ErrorCode::AuthExpired
            | ErrorCode::AuthMalformed => Self::invalid_client(),
            _ => {
                tracing::error!(error = %error, "OAuth request failed");
                Self::server_error()
            }
        }
    }
}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_error_body_has_no_status() {
        let body = serde_json::to_value(OAuth2Error::unsupported_response_type()).unwrap();
        assert_eq!(body["error"], "unsupported_response_type");
        assert!(body.get("status").is_none());
    }

    #[test]
    fn test_internal_errors_become_server_error() {
        let oauth: OAuth2Error = AppError::database("disk on fire").into();
        assert_eq!(oauth.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!oauth.message.contains("disk"));
    }

    #[test]
    fn test_token_response_omits_absent_refresh_token() {
        let body = serde_json::to_value(TokenResponse {
            access_token: "a".to_owned(),
            token_type: "Bearer".to_owned(),
            expires_in: 3600,
            refresh_token: None,
        })
        .unwrap();
        assert!(body.get("refresh_token").is_none());
    }
}
