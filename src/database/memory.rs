// ABOUTME: In-memory storage backend built on DashMap
// ABOUTME: Per-entry shard locks give atomic slot insertion and code consumption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{AuthStore, ConsumeOutcome, UserDirectory};
use crate::crypto::{hash_secret, verify_secret};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AuthorizationCode, Client, CodeStatus, Invite, NewUser, StoredSigningKey, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Process-local storage; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    signing_keys: DashMap<String, StoredSigningKey>,
    clients: DashMap<String, Client>,
    auth_codes: DashMap<String, AuthorizationCode>,
    users: DashMap<String, User>,
    invites: DashMap<Uuid, Invite>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn get_signing_key(&self, slot: &str) -> AppResult<Option<StoredSigningKey>> {
        Ok(self.signing_keys.get(slot).map(|entry| entry.value().clone()))
    }

    async fn insert_signing_key_if_absent(
        &self,
        slot: &str,
        key: StoredSigningKey,
    ) -> AppResult<StoredSigningKey> {
        let stored = self.signing_keys.entry(slot.to_owned()).or_insert(key);
        Ok(stored.value().clone())
    }

    async fn insert_client_if_absent(&self, client: &Client) -> AppResult<bool> {
        match self.clients.entry(client.client_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(client.clone());
                Ok(true)
            }
        }
    }

    async fn get_client(&self, client_id: &str) -> AppResult<Option<Client>> {
        Ok(self.clients.get(client_id).map(|entry| entry.value().clone()))
    }

    async fn bind_redirect_uri_if_absent(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> AppResult<Option<String>> {
        Ok(self.clients.get_mut(client_id).map(|mut entry| {
            entry
                .redirect_uri
                .get_or_insert_with(|| redirect_uri.to_owned())
                .clone()
        }))
    }

    async fn store_auth_code(&self, code: &AuthorizationCode) -> AppResult<()> {
        match self.auth_codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(AppError::storage("Authorization code collision")),
            Entry::Vacant(slot) => {
                slot.insert(code.clone());
                Ok(())
            }
        }
    }

    async fn consume_auth_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ConsumeOutcome> {
        // get_mut holds the shard write lock for the whole check-and-set
        let Some(mut entry) = self.auth_codes.get_mut(code) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        let record = entry.value_mut();

        if record.is_expired_at(now) || record.status == CodeStatus::Expired {
            if record.status == CodeStatus::Pending {
                record.status = CodeStatus::Expired;
            }
            return Ok(ConsumeOutcome::Expired);
        }
        if record.status != CodeStatus::Pending {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }

        record.status = CodeStatus::Consumed;
        Ok(ConsumeOutcome::Consumed(record.clone()))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .get(&email_key(email))
            .map(|entry| entry.value().clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let key = email_key(&new_user.email);
        if self.users.contains_key(&key) {
            return Err(AppError::already_exists("User already exists"));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.trim().to_owned(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            profile: new_user.profile,
            password_hash: hash_secret(&new_user.password).await?,
            created_at: Utc::now(),
        };

        match self.users.entry(key) {
            Entry::Occupied(_) => Err(AppError::already_exists("User already exists")),
            Entry::Vacant(slot) => Ok(slot.insert(user).value().clone()),
        }
    }

    async fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        verify_secret(password, &user.password_hash).await
    }

    async fn create_invite(&self, invite: &Invite) -> AppResult<()> {
        self.invites.insert(invite.invite_id, invite.clone());
        Ok(())
    }

    async fn get_invite(&self, invite_id: Uuid) -> AppResult<Option<Invite>> {
        Ok(self
            .invites
            .get(&invite_id)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::models::UserProfile;
    use chrono::Duration;

    fn pending_code(code: &str, ttl: Duration) -> AuthorizationCode {
        let now = Utc::now();
        AuthorizationCode {
            code: code.to_owned(),
            client_id: "acme".to_owned(),
            redirect_uri: "https://x/cb".to_owned(),
            issued_at: now,
            expires_at: now + ttl,
            status: CodeStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let store = MemoryStore::new();
        store
            .store_auth_code(&pending_code("abc", Duration::minutes(10)))
            .await
            .unwrap();

        let first = store.consume_auth_code("abc", Utc::now()).await.unwrap();
        assert!(matches!(first, ConsumeOutcome::Consumed(ref c) if c.status == CodeStatus::Consumed));

        let second = store.consume_auth_code("abc", Utc::now()).await.unwrap();
        assert_eq!(second, ConsumeOutcome::AlreadyConsumed);
    }

    #[tokio::test]
    async fn test_expired_code_marked_lazily() {
        let store = MemoryStore::new();
        store
            .store_auth_code(&pending_code("old", Duration::seconds(-1)))
            .await
            .unwrap();

        let outcome = store.consume_auth_code("old", Utc::now()).await.unwrap();
        assert_eq!(outcome, ConsumeOutcome::Expired);
        let status = store.auth_codes.get("old").map(|c| c.status);
        assert_eq!(status, Some(CodeStatus::Expired));
    }

    #[tokio::test]
    async fn test_user_email_is_case_insensitive() {
        let store = MemoryStore::new();
        store
            .create_user(NewUser {
                email: "Ada@Example.com".to_owned(),
                password: "pw".to_owned(),
                first_name: "Ada".to_owned(),
                last_name: "Lovelace".to_owned(),
                profile: UserProfile::default(),
            })
            .await
            .unwrap();

        assert!(store.find_by_email("ada@example.com").await.unwrap().is_some());
        let duplicate = store
            .create_user(NewUser {
                email: "ADA@example.com".to_owned(),
                password: "pw2".to_owned(),
                first_name: String::new(),
                last_name: String::new(),
                profile: UserProfile::default(),
            })
            .await;
        assert!(duplicate.is_err());
    }
}
