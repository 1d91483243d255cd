// ABOUTME: Domain models for clients, authorization codes, signing keys, users, and invites
// ABOUTME: Plain data shared between the storage backends and the flow controller
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use zeroize::Zeroize;

/// A registered OAuth client
///
/// The secret is held only as an Argon2 hash; the plaintext is returned once
/// at registration and never again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier
    pub client_id: String,
    /// Argon2 PHC string of the client secret
    #[serde(skip_serializing)]
    pub client_secret_hash: String,
    /// Exact redirect URI accepted by `/authorize`
    pub redirect_uri: Option<String>,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// Registration input for a client
#[derive(Clone)]
pub struct NewClient {
    /// Requested identifier
    pub client_id: String,
    /// Plaintext secret, hashed before storage
    pub client_secret: String,
    /// Optional redirect URI for the authorization-code flow
    pub redirect_uri: Option<String>,
}

impl fmt::Debug for NewClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Lifecycle of an authorization code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    /// Issued and not yet exchanged
    Pending,
    /// Exchanged once; terminal
    Consumed,
    /// Observed past expiry; terminal
    Expired,
}

impl CodeStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Consumed => "consumed",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for CodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "consumed" => Ok(Self::Consumed),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown code status: {other}")),
        }
    }
}

/// A single-use authorization code bound to a client and redirect URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// URL-safe random code
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Redirect URI the code was delivered to
    pub redirect_uri: String,
    /// Issue time
    pub issued_at: DateTime<Utc>,
    /// Hard expiry, checked on every read
    pub expires_at: DateTime<Utc>,
    /// Current status
    pub status: CodeStatus,
}

impl AuthorizationCode {
    /// Whether `now` is past the expiry
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Persisted signing key material
#[derive(Clone, PartialEq, Eq)]
pub struct StoredSigningKey {
    /// Key identifier, used as the JWT `kid`
    pub key_id: String,
    /// PKCS#8 DER private key
    pub private_key_der: Vec<u8>,
    /// Uncompressed SEC1 public point
    pub public_key: Vec<u8>,
    /// Generation time
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for StoredSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSigningKey")
            .field("key_id", &self.key_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Drop for StoredSigningKey {
    fn drop(&mut self) {
        self.private_key_der.zeroize();
    }
}

/// Optional profile details captured at signup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Account category chosen at signup
    pub user_type: String,
    /// Profession, for professional accounts
    pub professional_type: String,
    /// Postal code
    pub zip: String,
    /// Contact phone number
    pub phone: String,
}

/// A user record held by the user directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Unique login email
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Signup profile details
    pub profile: UserProfile,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public projection embedded in ID tokens
    #[must_use]
    pub fn payload(&self) -> UserPayload {
        UserPayload {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            profile: self.profile.clone(),
            created_at: self.created_at,
        }
    }
}

/// User fields safe to hand to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    /// Unique identifier
    pub id: Uuid,
    /// Login email
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Signup profile details
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Signup input for a user
#[derive(Clone)]
pub struct NewUser {
    /// Login email
    pub email: String,
    /// Plaintext password, hashed by the directory
    pub password: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Signup profile details
    pub profile: UserProfile,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a signup invite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    /// Sent, not yet used
    Pending,
    /// Used by the invitee
    Accepted,
    /// No longer usable
    Expired,
}

impl InviteStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown invite status: {other}")),
        }
    }
}

/// Invite created during signup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    /// Identifier embedded in the magic link
    pub invite_id: Uuid,
    /// Current status
    pub status: InviteStatus,
    /// Invitee email
    pub email: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
}

impl Invite {
    /// Whether the invite can no longer be used at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteStatus::Expired || self.expires_at < now
    }
}
