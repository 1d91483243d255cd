// ABOUTME: Client registry: registration, lookup, and constant-time client authentication
// ABOUTME: Secrets are generated with ring, stored as Argon2 hashes, and never returned again
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::auth_codes::{AuthorizationCodeStore, CodeConsumeError};
use crate::constants::oauth::CLIENT_SECRET_BYTES;
use crate::crypto::{hash_secret, random_urlsafe, verify_secret_or_dummy};
use crate::database::AuthStore;
use crate::errors::{AppError, AppResult};
use crate::models::{AuthorizationCode, Client, NewClient};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Registered OAuth clients
#[derive(Clone)]
pub struct ClientRegistry {
    store: Arc<dyn AuthStore>,
}

impl ClientRegistry {
    /// Create a registry over `store`
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Generate a fresh client secret
    ///
    /// # Errors
    ///
    /// Returns an internal error if the system RNG fails
    pub fn generate_client_secret() -> AppResult<String> {
        random_urlsafe(CLIENT_SECRET_BYTES)
    }

    /// Whether `uri` is an absolute http(s) URL
    #[must_use]
    pub fn is_valid_redirect_uri(uri: &str) -> bool {
        Url::parse(uri).is_ok_and(|url| {
            matches!(url.scheme(), "http" | "https") && url.host().is_some()
        })
    }

    /// Register a client
    ///
    /// Returns `Ok(false)` when the id or secret is empty or the id is already
    /// taken; an existing registration is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed redirect URI, or a storage error
    pub async fn register_client(&self, new_client: NewClient) -> AppResult<bool> {
        let client_id = new_client.client_id.trim();
        if client_id.is_empty() || new_client.client_secret.is_empty() {
            debug!("Rejected client registration with empty credentials");
            return Ok(false);
        }
        if let Some(uri) = &new_client.redirect_uri {
            if !Self::is_valid_redirect_uri(uri) {
                return Err(AppError::invalid_input(
                    "redirect_uri must be an absolute http(s) URL",
                ));
            }
        }

        let client = Client {
            client_id: client_id.to_owned(),
            client_secret_hash: hash_secret(&new_client.client_secret).await?,
            redirect_uri: new_client.redirect_uri,
            created_at: Utc::now(),
        };

        let inserted = self.store.insert_client_if_absent(&client).await?;
        if inserted {
            info!(client_id = %client.client_id, "Registered OAuth client");
            if client.redirect_uri.is_none() {
                warn!(
                    client_id = %client.client_id,
                    "Client registered without a redirect URI; the first authorized redirect will be bound to it"
                );
            }
        } else {
            warn!(client_id = %client.client_id, "Client registration rejected: id already taken");
        }
        Ok(inserted)
    }

    /// Look up a client
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no client has this id
    pub async fn get_client_by_id(&self, client_id: &str) -> AppResult<Client> {
        self.store
            .get_client(client_id)
            .await?
            .ok_or_else(|| AppError::not_found("Client"))
    }

    /// Bind `redirect_uri` to a client that registered none
    ///
    /// Returns the redirect URI the client is bound to afterwards, which is
    /// the earlier one when another request got there first.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no client has this id, or a storage error
    pub async fn bind_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> AppResult<String> {
        let bound = self
            .store
            .bind_redirect_uri_if_absent(client_id, redirect_uri)
            .await?
            .ok_or_else(|| AppError::not_found("Client"))?;
        if bound == redirect_uri {
            info!(client_id = %client_id, "Bound redirect URI to client");
        }
        Ok(bound)
    }

    /// Check a client's credentials
    ///
    /// Unknown ids and wrong secrets produce the same error and comparable
    /// latency.
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` on any credential mismatch, or a storage error
    pub async fn authenticate_client(&self, client_id: &str, client_secret: &str) -> AppResult<Client> {
        let client = self.store.get_client(client_id).await?;
        let stored_hash = client.as_ref().map(|c| c.client_secret_hash.as_str());

        if !verify_secret_or_dummy(client_secret, stored_hash).await? {
            warn!(client_id = %client_id, "Client authentication failed");
            return Err(AppError::auth_invalid("Invalid client credentials"));
        }

        client.ok_or_else(|| AppError::auth_invalid("Invalid client credentials"))
    }

    /// Authenticate a client and redeem an authorization code issued to it
    ///
    /// The code is consumed only after the credentials check out. A code
    /// issued to another client is burned and rejected.
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` for bad credentials or any code failure, or a
    /// storage error
    pub async fn authenticate_client_with_code(
        &self,
        client_id: &str,
        client_secret: &str,
        presented_code: &str,
        codes: &AuthorizationCodeStore,
    ) -> AppResult<AuthorizationCode> {
        self.authenticate_client(client_id, client_secret).await?;

        let code = match codes.consume_code(presented_code).await {
            Ok(code) => code,
            Err(CodeConsumeError::Storage(e)) => return Err(e),
            Err(e) => {
                warn!(client_id = %client_id, reason = %e, "Authorization code rejected");
                return Err(AppError::auth_invalid("Invalid authorization code"));
            }
        };

        if code.client_id != client_id {
            warn!(
                client_id = %client_id,
                "Authorization code presented by a client it was not issued to"
            );
            return Err(AppError::auth_invalid("Invalid authorization code"));
        }

        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::database::MemoryStore;

    fn registry() -> ClientRegistry {
        ClientRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn new_client(id: &str, secret: &str) -> NewClient {
        NewClient {
            client_id: id.to_owned(),
            client_secret: secret.to_owned(),
            redirect_uri: None,
        }
    }

    #[tokio::test]
    async fn test_empty_secret_rejected() {
        let registry = registry();
        assert!(!registry.register_client(new_client("acme", "")).await.unwrap());
        assert!(!registry.register_client(new_client("", "s3cret")).await.unwrap());
        assert!(registry.register_client(new_client("acme", "s3cret")).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_does_not_overwrite() {
        let registry = registry();
        assert!(registry.register_client(new_client("acme", "first")).await.unwrap());
        assert!(!registry.register_client(new_client("acme", "second")).await.unwrap());

        assert!(registry.authenticate_client("acme", "first").await.is_ok());
        assert!(registry.authenticate_client("acme", "second").await.is_err());
    }

    #[tokio::test]
    async fn test_stored_client_holds_only_hash() {
        let registry = registry();
        registry.register_client(new_client("acme", "s3cret")).await.unwrap();
        let client = registry.get_client_by_id("acme").await.unwrap();
        assert_ne!(client.client_secret_hash, "s3cret");
        assert!(!serde_json::to_string(&client).unwrap().contains("argon2"));
    }

    #[tokio::test]
    async fn test_unknown_and_wrong_secret_are_indistinguishable() {
        let registry = registry();
        registry.register_client(new_client("acme", "s3cret")).await.unwrap();

        let unknown = registry.authenticate_client("nobody", "s3cret").await.unwrap_err();
        let wrong = registry.authenticate_client("acme", "nope").await.unwrap_err();
        assert_eq!(unknown.code, wrong.code);
        assert_eq!(unknown.message, wrong.message);
    }

    #[tokio::test]
    async fn test_bad_redirect_uri_is_validation_error() {
        let registry = registry();
        let mut client = new_client("acme", "s3cret");
        client.redirect_uri = Some("not a url".to_owned());
        assert!(registry.register_client(client).await.is_err());
    }

    #[test]
    fn test_redirect_uri_validation() {
        assert!(ClientRegistry::is_valid_redirect_uri("https://x/cb"));
        assert!(ClientRegistry::is_valid_redirect_uri("http://localhost:3000/cb?a=1"));
        assert!(!ClientRegistry::is_valid_redirect_uri("ftp://x/cb"));
        assert!(!ClientRegistry::is_valid_redirect_uri("/relative"));
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = ClientRegistry::generate_client_secret().unwrap();
        let b = ClientRegistry::generate_client_secret().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }
}
