// ABOUTME: SQLite storage backend using a sqlx connection pool
// ABOUTME: Schema migrations at connect, unique-slot key insertion, and UPDATE..RETURNING code consumption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! `SQLite` backend.
//!
//! Timestamps are stored as unix milliseconds so expiry comparisons happen
//! inside the database without string formatting concerns.

use super::{AuthStore, ConsumeOutcome, UserDirectory};
use crate::constants::keys;
use crate::crypto::{hash_secret, verify_secret};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AuthorizationCode, Client, CodeStatus, Invite, InviteStatus, NewUser, StoredSigningKey, User,
    UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Pool size for file-backed databases
const MAX_CONNECTIONS: u32 = 8;

/// How long a writer waits on a locked database
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite` storage backend
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url` and migrate it
    ///
    /// # Errors
    ///
    /// Returns a database error if the URL is invalid, the file cannot be
    /// created, or a migration statement fails
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let is_memory = database_url.contains(":memory:");

        if !is_memory {
            if let Some(parent) = database_url
                .strip_prefix("sqlite:")
                .map(Path::new)
                .and_then(Path::parent)
                .filter(|dir| !dir.as_os_str().is_empty())
            {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::storage(format!(
                        "Cannot create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT)
            .journal_mode(if is_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            });

        // Each connection to :memory: is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(if is_memory { 1 } else { MAX_CONNECTIONS })
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(database_url, "SQLite storage ready");
        Ok(store)
    }

    /// Wrap an existing pool, running migrations
    ///
    /// # Errors
    ///
    /// Returns a database error if a migration statement fails
    pub async fn from_pool(pool: SqlitePool) -> AppResult<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> AppResult<()> {
        self.migrate_signing_keys().await?;
        self.migrate_clients().await?;
        self.migrate_auth_codes().await?;
        self.migrate_users().await?;
        self.migrate_invites().await?;
        debug!("SQLite migrations applied");
        Ok(())
    }

    async fn migrate_signing_keys(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS signing_keys (
                key_id TEXT PRIMARY KEY,
                slot TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                private_key BLOB NOT NULL,
                public_key BLOB NOT NULL,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_signing_keys_slot ON signing_keys(slot)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate_clients(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_clients (
                client_id TEXT PRIMARY KEY,
                client_secret_hash TEXT NOT NULL,
                redirect_uri TEXT,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate_auth_codes(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS authorization_codes (
                code TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'consumed', 'expired'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_authorization_codes_client ON authorization_codes(client_id)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate_users(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                user_type TEXT NOT NULL DEFAULT '',
                professional_type TEXT NOT NULL DEFAULT '',
                zip TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate_invites(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS invites (
                invite_id TEXT PRIMARY KEY,
                status TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'expired')),
                email TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(millis: i64) -> AppResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| AppError::database(format!("Invalid stored timestamp: {millis}")))
}

fn row_to_signing_key(row: &SqliteRow) -> AppResult<StoredSigningKey> {
    Ok(StoredSigningKey {
        key_id: row.try_get("key_id")?,
        private_key_der: row.try_get("private_key")?,
        public_key: row.try_get("public_key")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn row_to_client(row: &SqliteRow) -> AppResult<Client> {
    Ok(Client {
        client_id: row.try_get("client_id")?,
        client_secret_hash: row.try_get("client_secret_hash")?,
        redirect_uri: row.try_get("redirect_uri")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn row_to_auth_code(row: &SqliteRow) -> AppResult<AuthorizationCode> {
    let status: String = row.try_get("status")?;
    Ok(AuthorizationCode {
        code: row.try_get("code")?,
        client_id: row.try_get("client_id")?,
        redirect_uri: row.try_get("redirect_uri")?,
        issued_at: from_millis(row.try_get("issued_at")?)?,
        expires_at: from_millis(row.try_get("expires_at")?)?,
        status: status.parse().map_err(AppError::database)?,
    })
}

fn row_to_user(row: &SqliteRow) -> AppResult<User> {
    let id: String = row.try_get("id")?;
    Ok(User {
        id: Uuid::parse_str(&id).map_err(|e| AppError::database(e.to_string()))?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        profile: UserProfile {
            user_type: row.try_get("user_type")?,
            professional_type: row.try_get("professional_type")?,
            zip: row.try_get("zip")?,
            phone: row.try_get("phone")?,
        },
        password_hash: row.try_get("password_hash")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn row_to_invite(row: &SqliteRow) -> AppResult<Invite> {
    let invite_id: String = row.try_get("invite_id")?;
    let status: String = row.try_get("status")?;
    Ok(Invite {
        invite_id: Uuid::parse_str(&invite_id).map_err(|e| AppError::database(e.to_string()))?,
        status: status.parse::<InviteStatus>().map_err(AppError::database)?,
        email: row.try_get("email")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        expires_at: from_millis(row.try_get("expires_at")?)?,
    })
}

#[async_trait]
impl AuthStore for SqliteStore {
    async fn get_signing_key(&self, slot: &str) -> AppResult<Option<StoredSigningKey>> {
        let row = sqlx::query(
            r"
            SELECT key_id, private_key, public_key, created_at
            FROM signing_keys
            WHERE slot = ?1
            ORDER BY created_at ASC
            LIMIT 1
            ",
        )
        .bind(slot)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_signing_key).transpose()
    }

    async fn insert_signing_key_if_absent(
        &self,
        slot: &str,
        key: StoredSigningKey,
    ) -> AppResult<StoredSigningKey> {
        let inserted = sqlx::query(
            r"
            INSERT OR IGNORE INTO signing_keys
                (key_id, slot, algorithm, private_key, public_key, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&key.key_id)
        .bind(slot)
        .bind(keys::ALGORITHM)
        .bind(&key.private_key_der)
        .bind(&key.public_key)
        .bind(to_millis(key.created_at))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            debug!(slot, "Signing key slot already occupied; using stored key");
        }

        self.get_signing_key(slot)
            .await?
            .ok_or_else(|| AppError::storage("Signing key missing after insert"))
    }

    async fn insert_client_if_absent(&self, client: &Client) -> AppResult<bool> {
        let inserted = sqlx::query(
            r"
            INSERT OR IGNORE INTO oauth_clients (client_id, client_secret_hash, redirect_uri, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.redirect_uri)
        .bind(to_millis(client.created_at))
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }

    async fn get_client(&self, client_id: &str) -> AppResult<Option<Client>> {
        let row = sqlx::query(
            r"
            SELECT client_id, client_secret_hash, redirect_uri, created_at
            FROM oauth_clients
            WHERE client_id = ?1
            ",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_client).transpose()
    }

    async fn bind_redirect_uri_if_absent(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> AppResult<Option<String>> {
        sqlx::query(
            r"
            UPDATE oauth_clients
            SET redirect_uri = ?2
            WHERE client_id = ?1 AND redirect_uri IS NULL
            ",
        )
        .bind(client_id)
        .bind(redirect_uri)
        .execute(&self.pool)
        .await?;

        Ok(self
            .get_client(client_id)
            .await?
            .and_then(|client| client.redirect_uri))
    }

    async fn store_auth_code(&self, code: &AuthorizationCode) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO authorization_codes
                (code, client_id, redirect_uri, issued_at, expires_at, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(&code.redirect_uri)
        .bind(to_millis(code.issued_at))
        .bind(to_millis(code.expires_at))
        .bind(code.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_auth_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ConsumeOutcome> {
        let now_millis = to_millis(now);

        // Single statement: only one concurrent caller can flip pending -> consumed
        let consumed = sqlx::query(
            r"
            UPDATE authorization_codes
            SET status = 'consumed'
            WHERE code = ?1 AND status = 'pending' AND expires_at >= ?2
            RETURNING code, client_id, redirect_uri, issued_at, expires_at, status
            ",
        )
        .bind(code)
        .bind(now_millis)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = consumed {
            return Ok(ConsumeOutcome::Consumed(row_to_auth_code(&row)?));
        }

        let existing = sqlx::query(
            "SELECT status, expires_at FROM authorization_codes WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = existing else {
            return Ok(ConsumeOutcome::NotFound);
        };

        let status: String = row.try_get("status")?;
        let status = status.parse::<CodeStatus>().map_err(AppError::database)?;
        let expires_at: i64 = row.try_get("expires_at")?;

        if expires_at < now_millis || status == CodeStatus::Expired {
            sqlx::query(
                "UPDATE authorization_codes SET status = 'expired' WHERE code = ?1 AND status = 'pending'",
            )
            .bind(code)
            .execute(&self.pool)
            .await?;
            return Ok(ConsumeOutcome::Expired);
        }

        Ok(ConsumeOutcome::AlreadyConsumed)
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, email, first_name, last_name, user_type, professional_type, zip, phone,
                   password_hash, created_at
            FROM users
            WHERE email = ?1
            ",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.trim().to_owned(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            profile: new_user.profile,
            password_hash: hash_secret(&new_user.password).await?,
            created_at: Utc::now(),
        };

        let inserted = sqlx::query(
            r"
            INSERT OR IGNORE INTO users
                (id, email, first_name, last_name, user_type, professional_type, zip, phone,
                 password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.profile.user_type)
        .bind(&user.profile.professional_type)
        .bind(&user.profile.zip)
        .bind(&user.profile.phone)
        .bind(&user.password_hash)
        .bind(to_millis(user.created_at))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(AppError::already_exists("User already exists"));
        }
        Ok(user)
    }

    async fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        verify_secret(password, &user.password_hash).await
    }

    async fn create_invite(&self, invite: &Invite) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO invites (invite_id, status, email, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(invite.invite_id.to_string())
        .bind(invite.status.as_str())
        .bind(&invite.email)
        .bind(to_millis(invite.created_at))
        .bind(to_millis(invite.expires_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_invite(&self, invite_id: Uuid) -> AppResult<Option<Invite>> {
        let row = sqlx::query(
            "SELECT invite_id, status, email, created_at, expires_at FROM invites WHERE invite_id = ?1",
        )
        .bind(invite_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_invite).transpose()
    }
}
