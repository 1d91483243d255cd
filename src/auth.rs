// ABOUTME: Token service minting and verifying ES256 JWTs (access, ID, refresh)
// ABOUTME: Classifies verification failures as invalid signature, expired, or malformed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Token Service
//!
//! Every token is a compact JWS signed with the deployment's ES256 key:
//!
//! | kind    | `sub`                                | `aud`     | extra          |
//! |---------|--------------------------------------|-----------|----------------|
//! | access  | `client:<client_id>` or user email   | client id |                |
//! | id      | user email                           | client id | `user` payload |
//! | refresh | same as the paired access token      | client id |                |
//!
//! Verification pins the algorithm and issuer, then checks expiry itself so
//! an expired token is reported as such rather than as a bad signature.

use crate::config::AuthConfig;
use crate::constants::oauth::CLIENT_SUBJECT_PREFIX;
use crate::errors::{AppError, AppResult};
use crate::key_management::SigningKeyPair;
use crate::models::UserPayload;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Which of the three token shapes a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    /// Authorizes API calls for a client
    Access,
    /// Carries authenticated user identity
    Id,
    /// Exchanged for new access tokens
    Refresh,
}

/// JWT claims shared by all token kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject
    pub sub: String,
    /// Audience (client id)
    pub aud: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
    /// Token kind
    pub token_use: TokenUse,
    /// User payload, ID tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserPayload>,
}

impl Claims {
    /// Expiry as a timestamp
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Why a token failed verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenVerificationError {
    /// Signature, algorithm, or issuer did not check out against the current key
    #[error("Token signature is invalid: {reason}")]
    InvalidSignature {
        /// Reason for invalidity
        reason: String,
    },
    /// Signature is valid but the token is past `exp`
    #[error("Token expired at {}", expired_at.format("%Y-%m-%d %H:%M:%S UTC"))]
    Expired {
        /// When the token expired
        expired_at: DateTime<Utc>,
        /// Time of the check
        current_time: DateTime<Utc>,
    },
    /// Not a parsable JWT or the claims do not match the expected shape
    #[error("Token is malformed: {details}")]
    Malformed {
        /// What failed to parse
        details: String,
    },
}

impl From<TokenVerificationError> for AppError {
    fn from(error: TokenVerificationError) -> Self {
        match error {
            TokenVerificationError::InvalidSignature { .. } => Self::auth_invalid("Invalid token"),
            TokenVerificationError::Expired { .. } => Self::auth_expired(),
            TokenVerificationError::Malformed { .. } => Self::auth_malformed("Malformed token"),
        }
    }
}

/// Token lifetimes, in seconds
#[derive(Debug, Clone, Copy)]
struct Lifetimes {
    access: i64,
    id: i64,
    refresh: i64,
}

/// Mints and verifies signed tokens
#[derive(Clone)]
pub struct TokenManager {
    signing_key: Arc<SigningKeyPair>,
    issuer: String,
    lifetimes: Lifetimes,
}

impl TokenManager {
    /// Create a token manager bound to `signing_key`
    #[must_use]
    pub fn new(signing_key: Arc<SigningKeyPair>, config: &AuthConfig) -> Self {
        Self {
            signing_key,
            issuer: config.issuer.clone(),
            lifetimes: Lifetimes {
                access: config.access_token_ttl_secs,
                id: config.id_token_ttl_secs,
                refresh: config.refresh_token_ttl_secs,
            },
        }
    }

    /// Issuer stamped on every token
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Access token lifetime, reported as `expires_in`
    #[must_use]
    pub const fn access_token_ttl_secs(&self) -> i64 {
        self.lifetimes.access
    }

    /// Issue a short-lived access token for `audience_client_id`
    ///
    /// # Errors
    ///
    /// Returns an internal error if the expiry overflows or signing fails
    pub fn issue_access_token(&self, audience_client_id: &str) -> AppResult<String> {
        self.issue_access_token_for(
            &format!("{CLIENT_SUBJECT_PREFIX}{audience_client_id}"),
            audience_client_id,
        )
    }

    /// Issue an access token on behalf of `subject` (a user email or client subject)
    ///
    /// # Errors
    ///
    /// Returns an internal error if the expiry overflows or signing fails
    pub fn issue_access_token_for(
        &self,
        subject: &str,
        audience_client_id: &str,
    ) -> AppResult<String> {
        let claims = self.build_claims(
            subject.to_owned(),
            audience_client_id,
            self.lifetimes.access,
            TokenUse::Access,
            None,
        )?;
        self.sign_claims(&claims)
    }

    /// Issue an ID token describing `user` to `audience_client_id`
    ///
    /// # Errors
    ///
    /// Returns an internal error if the expiry overflows or signing fails
    pub fn issue_id_token(
        &self,
        subject_identity: &str,
        audience_client_id: &str,
        user: &UserPayload,
    ) -> AppResult<String> {
        let claims = self.build_claims(
            subject_identity.to_owned(),
            audience_client_id,
            self.lifetimes.id,
            TokenUse::Id,
            Some(user.clone()),
        )?;
        self.sign_claims(&claims)
    }

    /// Issue a long-lived refresh token for `audience_client_id`
    ///
    /// # Errors
    ///
    /// Returns an internal error if the expiry overflows or signing fails
    pub fn issue_refresh_token(&self, audience_client_id: &str) -> AppResult<String> {
        self.issue_refresh_token_for(
            &format!("{CLIENT_SUBJECT_PREFIX}{audience_client_id}"),
            audience_client_id,
        )
    }

    /// Issue a refresh token on behalf of `subject`
    ///
    /// # Errors
    ///
    /// Returns an internal error if the expiry overflows or signing fails
    pub fn issue_refresh_token_for(
        &self,
        subject: &str,
        audience_client_id: &str,
    ) -> AppResult<String> {
        let claims = self.build_claims(
            subject.to_owned(),
            audience_client_id,
            self.lifetimes.refresh,
            TokenUse::Refresh,
            None,
        )?;
        self.sign_claims(&claims)
    }

    fn build_claims(
        &self,
        sub: String,
        aud: &str,
        ttl_secs: i64,
        token_use: TokenUse,
        user: Option<UserPayload>,
    ) -> AppResult<Claims> {
        let now = Utc::now();
        let expires_at = expiry_after(now, TimeDelta::try_seconds(ttl_secs))?;
        Ok(Claims {
            iss: self.issuer.clone(),
            sub,
            aud: aud.to_owned(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_use,
            user,
        })
    }

    /// Sign arbitrary claims with the deployment key
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails
    pub fn sign_claims(&self, claims: &Claims) -> AppResult<String> {
        let mut header = Header::new(self.signing_key.algorithm());
        header.kid = Some(self.signing_key.key_id().to_owned());

        encode(&header, claims, self.signing_key.encoding_key())
            .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token's signature, issuer, and expiry
    ///
    /// # Errors
    ///
    /// Returns [`TokenVerificationError::InvalidSignature`] if the token was
    /// not signed by the current key (or names another issuer or algorithm),
    /// [`TokenVerificationError::Expired`] if it is past `exp`, and
    /// [`TokenVerificationError::Malformed`] if it does not parse
    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenVerificationError> {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub", "aud"]);

        let token_data = decode::<Claims>(token, self.signing_key.decoding_key(), &validation)
            .map_err(|e| Self::convert_jwt_error(&e))?;
        let claims = token_data.claims;

        let current_time = Utc::now();
        if current_time.timestamp() > claims.exp {
            let expired_at = claims.expires_at();
            debug!(%expired_at, "Rejected expired token");
            return Err(TokenVerificationError::Expired {
                expired_at,
                current_time,
            });
        }

        Ok(claims)
    }

    /// Verify a token and require a specific kind and audience
    ///
    /// # Errors
    ///
    /// Returns the verification error, or `InvalidSignature` if the kind or
    /// audience does not match
    pub fn verify_token_for(
        &self,
        token: &str,
        expected_use: TokenUse,
        audience_client_id: &str,
    ) -> Result<Claims, TokenVerificationError> {
        let claims = self.verify_token(token)?;
        if claims.token_use != expected_use || claims.aud != audience_client_id {
            return Err(TokenVerificationError::InvalidSignature {
                reason: "Token not valid for this client or purpose".to_owned(),
            });
        }
        Ok(claims)
    }

    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> TokenVerificationError {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature => TokenVerificationError::InvalidSignature {
                reason: "Token signature verification failed".to_owned(),
            },
            ErrorKind::InvalidAlgorithm => TokenVerificationError::InvalidSignature {
                reason: "Token signed with an unexpected algorithm".to_owned(),
            },
            ErrorKind::InvalidIssuer => TokenVerificationError::InvalidSignature {
                reason: "Token issued by another issuer".to_owned(),
            },
            ErrorKind::InvalidToken => TokenVerificationError::Malformed {
                details: "Token format is invalid".to_owned(),
            },
            ErrorKind::MissingRequiredClaim(claim) => TokenVerificationError::Malformed {
                details: format!("Token is missing the {claim} claim"),
            },
            ErrorKind::Base64(base64_err) => TokenVerificationError::Malformed {
                details: format!("Token contains invalid base64: {base64_err}"),
            },
            ErrorKind::Json(json_err) => TokenVerificationError::Malformed {
                details: format!("Token contains invalid JSON: {json_err}"),
            },
            ErrorKind::Utf8(utf8_err) => TokenVerificationError::Malformed {
                details: format!("Token contains invalid UTF-8: {utf8_err}"),
            },
            _ => {
                warn!("Token validation failed: {e:?}");
                TokenVerificationError::InvalidSignature {
                    reason: format!("Token validation failed: {e}"),
                }
            }
        }
    }
}

/// Instant `ttl` after `from`, rejecting lifetimes chrono cannot represent
///
/// # Errors
///
/// Returns an internal error when the lifetime or the resulting instant is
/// out of range
pub fn expiry_after(from: DateTime<Utc>, ttl: Option<TimeDelta>) -> AppResult<DateTime<Utc>> {
    ttl.and_then(|ttl| from.checked_add_signed(ttl))
        .ok_or_else(|| AppError::internal("Configured lifetime is out of range"))
}
