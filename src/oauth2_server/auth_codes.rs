// ABOUTME: Authorization code issuance and single-use consumption
// ABOUTME: Consumption is one atomic check-and-set in the backing store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::auth::expiry_after;
use crate::constants::oauth::AUTH_CODE_BYTES;
use crate::crypto::random_urlsafe;
use crate::database::{AuthStore, ConsumeOutcome};
use crate::errors::{AppError, AppResult};
use crate::models::{AuthorizationCode, CodeStatus};
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Why a code could not be consumed
#[derive(Debug, Error)]
pub enum CodeConsumeError {
    /// No such code was issued
    #[error("authorization code not found")]
    NotFound,
    /// The code outlived its TTL
    #[error("authorization code expired")]
    Expired,
    /// The code was already exchanged
    #[error("authorization code already consumed")]
    AlreadyConsumed,
    /// The store could not be reached
    #[error(transparent)]
    Storage(AppError),
}

impl From<CodeConsumeError> for AppError {
    fn from(error: CodeConsumeError) -> Self {
        match error {
            CodeConsumeError::Storage(e) => e,
            other => Self::auth_invalid(other.to_string()),
        }
    }
}

/// Issues and redeems authorization codes
#[derive(Clone)]
pub struct AuthorizationCodeStore {
    store: Arc<dyn AuthStore>,
    ttl_secs: i64,
}

impl AuthorizationCodeStore {
    /// Create a code store with codes living `ttl_secs`
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, ttl_secs: i64) -> Self {
        Self { store, ttl_secs }
    }

    /// Issue a pending code bound to `client_id` and `redirect_uri`
    ///
    /// # Errors
    ///
    /// Returns an internal error if the RNG fails or the lifetime is out of
    /// range, or a storage error if the code cannot be persisted
    pub async fn issue_code(&self, client_id: &str, redirect_uri: &str) -> AppResult<String> {
        let issued_at = Utc::now();
        let expires_at = expiry_after(issued_at, TimeDelta::try_seconds(self.ttl_secs))?;
        let record = AuthorizationCode {
            code: random_urlsafe(AUTH_CODE_BYTES)?,
            client_id: client_id.to_owned(),
            redirect_uri: redirect_uri.to_owned(),
            issued_at,
            expires_at,
            status: CodeStatus::Pending,
        };

        self.store.store_auth_code(&record).await?;
        debug!(client_id = %client_id, expires_at = %record.expires_at, "Issued authorization code");
        Ok(record.code)
    }

    /// Redeem a code exactly once
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Expired`, or `AlreadyConsumed` when the code is not
    /// redeemable, or `Storage` when the store fails
    pub async fn consume_code(&self, code: &str) -> Result<AuthorizationCode, CodeConsumeError> {
        if code.is_empty() {
            return Err(CodeConsumeError::NotFound);
        }

        match self
            .store
            .consume_auth_code(code, Utc::now())
            .await
            .map_err(CodeConsumeError::Storage)?
        {
            ConsumeOutcome::Consumed(record) => Ok(record),
            ConsumeOutcome::NotFound => Err(CodeConsumeError::NotFound),
            ConsumeOutcome::Expired => Err(CodeConsumeError::Expired),
            ConsumeOutcome::AlreadyConsumed => Err(CodeConsumeError::AlreadyConsumed),
        }
    }
}
