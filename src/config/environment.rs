// ABOUTME: Environment-based configuration for the auth server
// ABOUTME: Parses ports, storage URL, token lifetimes, and notification settings with defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-only configuration.
//!
//! Every setting has a default so the server starts with an empty
//! environment. Values that are present but unparsable are a hard error.

use crate::constants::{lifetimes, ports, service_names};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Default on-disk database location
const DEFAULT_DATABASE_URL: &str = "sqlite:./data/user_auth.db";

/// Type-safe storage selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (schema and queries identical to the file backend)
    SQLiteMemory,
    /// Process-local maps, no persistence
    Memory,
}

impl DatabaseUrl {
    /// Parse from string
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        match s {
            "memory" => Self::Memory,
            "sqlite::memory:" => Self::SQLiteMemory,
            other => Self::SQLite {
                path: PathBuf::from(other.strip_prefix("sqlite:").unwrap_or(other)),
            },
        }
    }

    /// Convert to a sqlx connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::SQLiteMemory => "sqlite::memory:".to_owned(),
            Self::Memory => "memory".to_owned(),
        }
    }

    /// Whether data survives a restart
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        matches!(self, Self::SQLite { .. })
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::parse_url(DEFAULT_DATABASE_URL)
    }
}

/// Token issuance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// `iss` claim stamped on every token and required on verification
    pub issuer: String,
    /// Access token lifetime
    pub access_token_ttl_secs: i64,
    /// ID token lifetime
    pub id_token_ttl_secs: i64,
    /// Refresh token lifetime
    pub refresh_token_ttl_secs: i64,
    /// Authorization code lifetime
    pub auth_code_ttl_secs: i64,
    /// Signup invite lifetime
    pub invite_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: service_names::USER_AUTH_SERVER.to_owned(),
            access_token_ttl_secs: lifetimes::ACCESS_TOKEN_TTL_SECS,
            id_token_ttl_secs: lifetimes::ID_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: lifetimes::REFRESH_TOKEN_TTL_SECS,
            auth_code_ttl_secs: lifetimes::AUTH_CODE_TTL_SECS,
            invite_ttl_hours: lifetimes::INVITE_TTL_HOURS,
        }
    }
}

/// Outbound notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Base URL of the notification service; `None` disables delivery
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: lifetimes::NOTIFICATION_TIMEOUT_SECS,
        }
    }
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Storage backend
    pub database: DatabaseUrl,
    /// Token settings
    pub auth: AuthConfig,
    /// Notification settings
    pub notifications: NotificationConfig,
    /// Externally reachable base URL, used to build invite links
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            http_port: ports::DEFAULT_HTTP_PORT,
            database: DatabaseUrl::default(),
            auth: AuthConfig::default(),
            notifications: NotificationConfig::default(),
            public_base_url: format!("http://localhost:{}", ports::DEFAULT_HTTP_PORT),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that does not parse
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let defaults = Self::default();
        let http_port = parse_env_or("HTTP_PORT", defaults.http_port)?;

        let config = Self {
            host: env_var_or("HOST", &defaults.host),
            http_port,
            database: env::var("DATABASE_URL")
                .map_or(defaults.database, |url| DatabaseUrl::parse_url(&url)),
            auth: AuthConfig {
                issuer: env_var_or("JWT_ISSUER", &defaults.auth.issuer),
                access_token_ttl_secs: parse_env_or(
                    "ACCESS_TOKEN_TTL_SECS",
                    defaults.auth.access_token_ttl_secs,
                )?,
                id_token_ttl_secs: parse_env_or("ID_TOKEN_TTL_SECS", defaults.auth.id_token_ttl_secs)?,
                refresh_token_ttl_secs: parse_env_or(
                    "REFRESH_TOKEN_TTL_SECS",
                    defaults.auth.refresh_token_ttl_secs,
                )?,
                auth_code_ttl_secs: parse_env_or(
                    "AUTH_CODE_TTL_SECS",
                    defaults.auth.auth_code_ttl_secs,
                )?,
                invite_ttl_hours: parse_env_or("INVITE_TTL_HOURS", defaults.auth.invite_ttl_hours)?,
            },
            notifications: NotificationConfig {
                base_url: env::var("NOTIFICATION_BASE_URL")
                    .ok()
                    .filter(|url| !url.trim().is_empty()),
                timeout_secs: parse_env_or(
                    "NOTIFICATION_TIMEOUT_SECS",
                    defaults.notifications.timeout_secs,
                )?,
            },
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{http_port}")),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would mint unusable tokens
    ///
    /// # Errors
    ///
    /// Returns an error if any lifetime is non-positive or the issuer is empty
    pub fn validate(&self) -> Result<()> {
        if self.auth.issuer.trim().is_empty() {
            anyhow::bail!("JWT_ISSUER must not be empty");
        }
        let bounds = [
            ("ACCESS_TOKEN_TTL_SECS", self.auth.access_token_ttl_secs, lifetimes::MAX_TTL_SECS),
            ("ID_TOKEN_TTL_SECS", self.auth.id_token_ttl_secs, lifetimes::MAX_TTL_SECS),
            ("REFRESH_TOKEN_TTL_SECS", self.auth.refresh_token_ttl_secs, lifetimes::MAX_TTL_SECS),
            ("AUTH_CODE_TTL_SECS", self.auth.auth_code_ttl_secs, lifetimes::MAX_TTL_SECS),
            ("INVITE_TTL_HOURS", self.auth.invite_ttl_hours, lifetimes::MAX_INVITE_TTL_HOURS),
        ];
        for (name, value, max) in bounds {
            if value <= 0 {
                anyhow::bail!("{name} must be positive, got {value}");
            }
            if value > max {
                anyhow::bail!("{name} must be at most {max}, got {value}");
            }
        }
        Ok(())
    }

    /// One-line summary safe to log
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "user-auth-server config: host={} port={} storage={} issuer={} access_ttl={}s refresh_ttl={}s notifications={}",
            self.host,
            self.http_port,
            self.database.to_connection_string(),
            self.auth.issuer,
            self.auth.access_token_ttl_secs,
            self.auth.refresh_token_ttl_secs,
            self.notifications.base_url.as_deref().unwrap_or("disabled"),
        )
    }
}

/// Read an environment variable with a fallback
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back when unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}")),
        Err(_) => Ok(default),
    }
}
