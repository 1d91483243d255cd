// ABOUTME: Core types and constants for the user auth server workspace
// ABOUTME: Foundation crate with error handling and protocol constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # User Auth Core
//!
//! Foundation crate shared by the authorization server. It changes rarely,
//! which keeps the main crate's incremental builds cheap.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Token lifetimes, header names, and service identifiers

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;
