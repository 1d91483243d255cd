// ABOUTME: Tests for environment-driven server configuration
// ABOUTME: Serialized because they mutate process environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use serial_test::serial;
use std::env;
use std::io;
use std::sync::{Arc, Mutex};
use user_auth_server::config::{DatabaseUrl, ServerConfig};

const VARS: &[&str] = &[
    "HOST",
    "HTTP_PORT",
    "DATABASE_URL",
    "JWT_ISSUER",
    "ACCESS_TOKEN_TTL_SECS",
    "ID_TOKEN_TTL_SECS",
    "REFRESH_TOKEN_TTL_SECS",
    "AUTH_CODE_TTL_SECS",
    "INVITE_TTL_HOURS",
    "NOTIFICATION_BASE_URL",
    "NOTIFICATION_TIMEOUT_SECS",
    "PUBLIC_BASE_URL",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_with_empty_environment() {
    clear_env();
    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.http_port, 8081);
    assert_eq!(config.auth.auth_code_ttl_secs, 600);
    assert_eq!(config.auth.access_token_ttl_secs, 3600);
    assert!(config.notifications.base_url.is_none());
    assert_eq!(config.public_base_url, "http://localhost:8081");
    assert!(config.database.is_persistent());
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear_env();
    env::set_var("HTTP_PORT", "9090");
    env::set_var("DATABASE_URL", "memory");
    env::set_var("JWT_ISSUER", "https://auth.example.com");
    env::set_var("ACCESS_TOKEN_TTL_SECS", "900");
    env::set_var("NOTIFICATION_BASE_URL", "http://notify.internal");
    env::set_var("NOTIFICATION_TIMEOUT_SECS", "2");

    let config = ServerConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.http_port, 9090);
    assert_eq!(config.database, DatabaseUrl::Memory);
    assert_eq!(config.auth.issuer, "https://auth.example.com");
    assert_eq!(config.auth.access_token_ttl_secs, 900);
    assert_eq!(
        config.notifications.base_url.as_deref(),
        Some("http://notify.internal")
    );
    assert_eq!(config.notifications.timeout_secs, 2);
    assert_eq!(config.public_base_url, "http://localhost:9090");
}

#[test]
#[serial]
fn test_blank_notification_url_disables_delivery() {
    clear_env();
    env::set_var("NOTIFICATION_BASE_URL", "   ");
    let config = ServerConfig::from_env().unwrap();
    clear_env();

    assert!(config.notifications.base_url.is_none());
    assert!(config.summary().contains("notifications=disabled"));
}

#[test]
#[serial]
fn test_unparsable_values_are_errors() {
    clear_env();
    env::set_var("HTTP_PORT", "not-a-port");
    let port_error = ServerConfig::from_env().unwrap_err();
    clear_env();
    assert!(port_error.to_string().contains("HTTP_PORT"));

    env::set_var("AUTH_CODE_TTL_SECS", "0");
    let ttl_error = ServerConfig::from_env().unwrap_err();
    clear_env();
    assert!(ttl_error.to_string().contains("AUTH_CODE_TTL_SECS"));
}

#[test]
#[serial]
fn test_lifetimes_beyond_ten_years_are_rejected() {
    clear_env();
    env::set_var("ACCESS_TOKEN_TTL_SECS", i64::MAX.to_string());
    let token_error = ServerConfig::from_env().unwrap_err();
    clear_env();
    assert!(token_error.to_string().contains("ACCESS_TOKEN_TTL_SECS"));

    env::set_var("INVITE_TTL_HOURS", "1000000000");
    let invite_error = ServerConfig::from_env().unwrap_err();
    clear_env();
    assert!(invite_error.to_string().contains("INVITE_TTL_HOURS"));

    env::set_var("REFRESH_TOKEN_TTL_SECS", (10 * 365 * 24 * 3600).to_string());
    let at_limit = ServerConfig::from_env().unwrap();
    clear_env();
    assert_eq!(at_limit.auth.refresh_token_ttl_secs, 315_360_000);
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
#[serial]
fn test_config_loading_is_logged_once_a_subscriber_is_installed() {
    clear_env();
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || ServerConfig::from_env().unwrap());

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Loading configuration from environment variables"));
}
