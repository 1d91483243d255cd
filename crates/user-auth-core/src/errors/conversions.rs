// ABOUTME: Feature-gated conversions from third-party error types into AppError
// ABOUTME: Keeps sqlx, reqwest, and ring failures on the server-side error codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{AppError, ErrorCode};

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::not_found("Record"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::new(ErrorCode::StorageError, error.to_string())
            }
            other => Self::new(ErrorCode::DatabaseError, other.to_string()),
        }
    }
}

#[cfg(feature = "provider-errors")]
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        let reason = if error.is_timeout() {
            "request timed out".to_owned()
        } else {
            error.to_string()
        };
        Self::external_service("http", reason)
    }
}

#[cfg(feature = "crypto-errors")]
impl From<ring::error::Unspecified> for AppError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::internal("Cryptographic operation failed")
    }
}
