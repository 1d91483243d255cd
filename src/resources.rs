// ABOUTME: Shared server resources built once at startup and handed to every route
// ABOUTME: Wires storage, the signing key, token service, and flow controller together
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server Resources
//!
//! Everything a handler needs, behind `Arc`s so cloning the container is cheap.

use crate::auth::TokenManager;
use crate::config::ServerConfig;
use crate::database::Storage;
use crate::errors::AppResult;
use crate::key_management::{KeyManager, SigningKeyPair};
use crate::notifications::{notifier_from_config, Notifier};
use crate::oauth2_server::{AuthorizationCodeStore, AuthorizationFlow, ClientRegistry, FlowSettings};
use std::sync::Arc;

/// Dependency container for the HTTP layer
#[derive(Clone)]
pub struct ServerResources {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Storage backends
    pub storage: Storage,
    /// The deployment's signing key
    pub signing_key: Arc<SigningKeyPair>,
    /// Token minting and verification
    pub token_manager: Arc<TokenManager>,
    /// Registered clients
    pub client_registry: ClientRegistry,
    /// Authorization codes
    pub code_store: AuthorizationCodeStore,
    /// Invite delivery
    pub notifier: Arc<dyn Notifier>,
    /// Protocol operations
    pub flow: Arc<AuthorizationFlow>,
}

impl ServerResources {
    /// Assemble resources around an already loaded signing key
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        storage: Storage,
        signing_key: Arc<SigningKeyPair>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let token_manager = Arc::new(TokenManager::new(signing_key.clone(), &config.auth));
        let client_registry = ClientRegistry::new(storage.auth.clone());
        let code_store =
            AuthorizationCodeStore::new(storage.auth.clone(), config.auth.auth_code_ttl_secs);

        let flow = Arc::new(AuthorizationFlow::new(
            client_registry.clone(),
            code_store.clone(),
            token_manager.clone(),
            storage.users.clone(),
            notifier.clone(),
            FlowSettings::from_config(&config),
        ));

        Self {
            config,
            storage,
            signing_key,
            token_manager,
            client_registry,
            code_store,
            notifier,
            flow,
        }
    }

    /// Open storage, load or create the signing key, and assemble resources
    ///
    /// # Errors
    ///
    /// Returns a config error if the notifier cannot be built, or a storage
    /// error if the backend cannot be opened or the key cannot be loaded
    pub async fn bootstrap(config: ServerConfig) -> AppResult<Self> {
        let notifier = notifier_from_config(&config.notifications)?;
        let storage = Storage::connect(&config.database).await?;
        let signing_key = KeyManager::get_or_create_signing_key(storage.auth.as_ref()).await?;

        Ok(Self::new(
            Arc::new(config),
            storage,
            Arc::new(signing_key),
            notifier,
        ))
    }
}
