// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Token lifetimes, OAuth vocabulary, header names, and service identifiers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants grouped by domain.

/// Service identifiers
pub mod service_names {
    /// Default issuer and log service name
    pub const USER_AUTH_SERVER: &str = "user-auth-server";
}

/// Token and code lifetimes
pub mod lifetimes {
    /// Access token lifetime (1 hour)
    pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
    /// ID token lifetime (1 hour)
    pub const ID_TOKEN_TTL_SECS: i64 = 3600;
    /// Refresh token lifetime (30 days)
    pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;
    /// Authorization code lifetime (10 minutes)
    pub const AUTH_CODE_TTL_SECS: i64 = 600;
    /// Signup invite lifetime
    pub const INVITE_TTL_HOURS: i64 = 72;
    /// Longest accepted token or code lifetime (10 years)
    pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 3600;
    /// Longest accepted invite lifetime (10 years)
    pub const MAX_INVITE_TTL_HOURS: i64 = 10 * 365 * 24;
    /// Outbound notification timeout
    pub const NOTIFICATION_TIMEOUT_SECS: u64 = 10;
}

/// OAuth 2.0 protocol vocabulary
pub mod oauth {
    /// The only supported `response_type`
    pub const RESPONSE_TYPE_CODE: &str = "code";
    /// Authorization code grant
    pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
    /// Refresh token grant
    pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
    /// Token type returned by the token endpoint
    pub const TOKEN_TYPE_BEARER: &str = "Bearer";
    /// Random bytes in an authorization code
    pub const AUTH_CODE_BYTES: usize = 32;
    /// Random bytes in a generated client secret
    pub const CLIENT_SECRET_BYTES: usize = 32;
    /// Subject prefix for tokens that carry no user identity
    pub const CLIENT_SUBJECT_PREFIX: &str = "client:";
}

/// Signing keys
pub mod keys {
    /// Storage slot holding the active signing key
    pub const PRIMARY_SLOT: &str = "primary";
    /// JWS algorithm name
    pub const ALGORITHM: &str = "ES256";
    /// JWK curve name
    pub const CURVE: &str = "P-256";
}

/// HTTP header names
pub mod headers {
    /// Client identifier header used by login and signup
    pub const CLIENT_ID: &str = "client-id";
    /// Bearer scheme prefix
    pub const BEARER_PREFIX: &str = "Bearer ";
}

/// Network defaults
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
}
