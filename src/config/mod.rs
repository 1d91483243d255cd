// ABOUTME: Configuration module root
// ABOUTME: Exposes the environment-driven server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Environment variable parsing and typed configuration
pub mod environment;

pub use environment::{AuthConfig, DatabaseUrl, NotificationConfig, ServerConfig};
