// ABOUTME: Main library entry point for the user auth server
// ABOUTME: Wires the key manager, client registry, code store, and token service into an HTTP API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # User Auth Server
//!
//! An OAuth2-style authorization server. Clients register once, run the
//! authorization-code exchange, and receive ES256-signed access, ID, and
//! refresh tokens. Users can also log in or sign up directly and be
//! redirected back with tokens attached.
//!
//! ## Layout
//!
//! - [`key_management`]: the process-wide ECDSA signing key
//! - [`oauth2_server`]: client registry, authorization codes, and the flow controller
//! - [`auth`]: token minting and verification
//! - [`database`]: storage traits with in-memory and `SQLite` backends
//! - [`routes`]: axum handlers for the HTTP surface

/// Token minting and verification
pub mod auth;

/// Environment-driven configuration
pub mod config;

/// Key generation, randomness, and secret hashing
pub mod crypto;

/// Application constants
pub mod constants;

/// Storage traits and backends for keys, clients, codes, users, and invites
pub mod database;

/// Unified error handling
pub mod errors;

/// Signing key bootstrap and JWK export
pub mod key_management;

/// Structured logging setup
pub mod logging;

/// HTTP middleware (bearer token extraction)
pub mod middleware;

/// Domain models shared across layers
pub mod models;

/// Best-effort outbound notifications
pub mod notifications;

/// OAuth 2.0 authorization server components
pub mod oauth2_server;

/// Shared server resources for dependency injection
pub mod resources;

/// HTTP route handlers
pub mod routes;
