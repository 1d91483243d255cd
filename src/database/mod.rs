// ABOUTME: Storage traits for signing keys, clients, authorization codes, users, and invites
// ABOUTME: Backend selection between the in-memory maps and the SQLite pool
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Storage
//!
//! The core components never touch a backend directly. They call two narrow
//! traits:
//!
//! - [`AuthStore`]: signing keys, OAuth clients, and authorization codes
//! - [`UserDirectory`]: user records, password checks, and signup invites
//!
//! Both backends provide the two atomic primitives the protocol depends on:
//! first-writer-wins insertion for the signing key slot and a single
//! check-and-set for authorization code consumption.

/// `DashMap`-backed storage for tests and ephemeral deployments
pub mod memory;

/// `SQLite` storage via sqlx
pub mod sqlite;

use crate::config::DatabaseUrl;
use crate::errors::AppResult;
use crate::models::{AuthorizationCode, Client, Invite, NewUser, StoredSigningKey, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result of an atomic authorization code consumption
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The code was pending and unexpired; it is now consumed
    Consumed(AuthorizationCode),
    /// No such code
    NotFound,
    /// The code is past its expiry
    Expired,
    /// The code was consumed earlier
    AlreadyConsumed,
}

/// Persistence for the OAuth core
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Load the signing key held in `slot`
    async fn get_signing_key(&self, slot: &str) -> AppResult<Option<StoredSigningKey>>;

    /// Store `key` in `slot` unless the slot is already taken
    ///
    /// Returns whichever key occupies the slot afterwards.
    async fn insert_signing_key_if_absent(
        &self,
        slot: &str,
        key: StoredSigningKey,
    ) -> AppResult<StoredSigningKey>;

    /// Insert a client; returns `false` without writing when the id is taken
    async fn insert_client_if_absent(&self, client: &Client) -> AppResult<bool>;

    /// Look up a client by id
    async fn get_client(&self, client_id: &str) -> AppResult<Option<Client>>;

    /// Set a client's redirect URI unless one is already bound
    ///
    /// Returns the redirect URI bound afterwards, or `None` for an unknown
    /// client.
    async fn bind_redirect_uri_if_absent(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> AppResult<Option<String>>;

    /// Persist a freshly issued authorization code
    async fn store_auth_code(&self, code: &AuthorizationCode) -> AppResult<()>;

    /// Atomically move a pending, unexpired code to consumed
    async fn consume_auth_code(&self, code: &str, now: DateTime<Utc>)
        -> AppResult<ConsumeOutcome>;
}

/// User records and signup invites
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Create a user, hashing the password
    ///
    /// Fails with `ResourceAlreadyExists` when the email is taken.
    async fn create_user(&self, new_user: NewUser) -> AppResult<User>;

    /// Check a plaintext password against the stored hash
    async fn verify_password(&self, user: &User, password: &str) -> AppResult<bool>;

    /// Persist an invite
    async fn create_invite(&self, invite: &Invite) -> AppResult<()>;

    /// Look up an invite by id
    async fn get_invite(&self, invite_id: Uuid) -> AppResult<Option<Invite>>;
}

/// Both storage roles, backed by the same backend
#[derive(Clone)]
pub struct Storage {
    /// Keys, clients, and codes
    pub auth: Arc<dyn AuthStore>,
    /// Users and invites
    pub users: Arc<dyn UserDirectory>,
}

impl Storage {
    /// Open the backend selected by `url`, running migrations where needed
    ///
    /// # Errors
    ///
    /// Returns a database error if the `SQLite` pool cannot be opened or migrated
    pub async fn connect(url: &DatabaseUrl) -> AppResult<Self> {
        match url {
            DatabaseUrl::Memory => Ok(Self::from_backend(Arc::new(MemoryStore::new()))),
            DatabaseUrl::SQLite { .. } | DatabaseUrl::SQLiteMemory => {
                let store = SqliteStore::connect(&url.to_connection_string()).await?;
                Ok(Self::from_backend(Arc::new(store)))
            }
        }
    }

    /// Use one backend for both roles
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AuthStore + UserDirectory + 'static,
    {
        Self {
            auth: backend.clone(),
            users: backend,
        }
    }
}
