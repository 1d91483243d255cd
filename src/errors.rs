// ABOUTME: Re-exports the unified error types from the core crate
// ABOUTME: Gives the server crate a single `crate::errors` import path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Unified error handling, re-exported from `user-auth-core`.

pub use user_auth_core::errors::{AppError, AppResult, ErrorCode, ErrorResponse};
