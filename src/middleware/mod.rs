// ABOUTME: HTTP middleware for bearer authentication and request tracing
// ABOUTME: Request IDs and spans come from tower-http layers assembled here
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Bearer token extraction and verification
pub mod auth;
/// Request ID propagation and per-request spans
pub mod tracing;

pub use auth::{bearer_token, BearerClaims};
pub use tracing::with_request_tracing;
