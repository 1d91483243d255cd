// ABOUTME: Signing key bootstrap: load the ES256 key pair from storage or generate it once
// ABOUTME: Exposes jsonwebtoken encoding/decoding keys and the public JWK for the JWKS endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Key Management
//!
//! Exactly one ECDSA P-256 key pair signs every token the server issues. It
//! lives in the key store under a single well-known slot. At startup
//! [`KeyManager::get_or_create_signing_key`] either loads it or generates one
//! and inserts it with first-writer-wins semantics, so servers racing through
//! a cold start all end up with the same key.
//!
//! The resulting [`SigningKeyPair`] is immutable. Share it behind an `Arc`.

use crate::constants::keys;
use crate::crypto::{generate_es256_keypair, public_point_from_pkcs8};
use crate::database::AuthStore;
use crate::errors::{AppError, AppResult};
use crate::models::StoredSigningKey;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

/// JWK (JSON Web Key) representation of the public signing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "EC")
    pub kty: String,
    /// Curve (always "P-256")
    pub crv: String,
    /// X coordinate (base64url)
    pub x: String,
    /// Y coordinate (base64url)
    pub y: String,
    /// Key ID matching the JWT `kid` header
    pub kid: String,
    /// Algorithm (ES256)
    pub alg: String,
    /// Public key use (always "sig")
    #[serde(rename = "use")]
    pub key_use: String,
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Published keys
    pub keys: Vec<JsonWebKey>,
}

/// The process-wide ES256 signing key pair
pub struct SigningKeyPair {
    key_id: String,
    created_at: DateTime<Utc>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    x: String,
    y: String,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Generate a fresh key pair that is not yet persisted
    ///
    /// # Errors
    ///
    /// Returns an internal error if key generation fails
    pub fn generate() -> AppResult<Self> {
        Self::from_stored(&Self::generate_stored()?)
    }

    fn generate_stored() -> AppResult<StoredSigningKey> {
        let (private_key_der, public_key) = generate_es256_keypair()?;
        Ok(StoredSigningKey {
            key_id: format!("es256-{}", Uuid::new_v4().simple()),
            private_key_der,
            public_key,
            created_at: Utc::now(),
        })
    }

    /// Rebuild the key pair from stored material
    ///
    /// # Errors
    ///
    /// Returns an internal error if the private key does not parse or does not
    /// match the stored public key
    pub fn from_stored(stored: &StoredSigningKey) -> AppResult<Self> {
        let derived_public = public_point_from_pkcs8(&stored.private_key_der)?;
        if derived_public != stored.public_key {
            return Err(AppError::internal(format!(
                "Stored public key does not match private key for {}",
                stored.key_id
            )));
        }

        // Uncompressed SEC1: 0x04 || X (32 bytes) || Y (32 bytes)
        let (x_bytes, y_bytes) = match derived_public.split_first() {
            Some((&0x04, coords)) if coords.len() == 64 => coords.split_at(32),
            _ => return Err(AppError::internal("Unexpected public key encoding")),
        };
        let x = URL_SAFE_NO_PAD.encode(x_bytes);
        let y = URL_SAFE_NO_PAD.encode(y_bytes);

        let decoding_key = DecodingKey::from_ec_components(&x, &y)
            .map_err(|e| AppError::internal(format!("Invalid EC public key: {e}")))?;

        Ok(Self {
            key_id: stored.key_id.clone(),
            created_at: stored.created_at,
            encoding_key: EncodingKey::from_ec_der(&stored.private_key_der),
            decoding_key,
            x,
            y,
        })
    }

    /// Key identifier carried in the JWT `kid` header
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Signing algorithm; fixed for every token
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        Algorithm::ES256
    }

    /// When the key was generated
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Private key for signing
    #[must_use]
    pub const fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Public key for verification
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Public key as a JWK
    #[must_use]
    pub fn to_jwk(&self) -> JsonWebKey {
        JsonWebKey {
            kty: "EC".to_owned(),
            crv: keys::CURVE.to_owned(),
            x: self.x.clone(),
            y: self.y.clone(),
            kid: self.key_id.clone(),
            alg: keys::ALGORITHM.to_owned(),
            key_use: "sig".to_owned(),
        }
    }

    /// JWKS document containing this key
    #[must_use]
    pub fn jwks(&self) -> JsonWebKeySet {
        JsonWebKeySet {
            keys: vec![self.to_jwk()],
        }
    }
}

/// Loads or creates the deployment's signing key
pub struct KeyManager;

impl KeyManager {
    /// Return the signing key in the primary slot, generating it if absent
    ///
    /// Call once at startup. If another process wins the race to insert, its
    /// key is returned and the locally generated one is discarded.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the key store is unreachable, or an internal
    /// error if stored key material is corrupt
    pub async fn get_or_create_signing_key(store: &dyn AuthStore) -> AppResult<SigningKeyPair> {
        if let Some(stored) = store.get_signing_key(keys::PRIMARY_SLOT).await? {
            info!(key_id = %stored.key_id, "Loaded existing signing key");
            return SigningKeyPair::from_stored(&stored);
        }

        let candidate = SigningKeyPair::generate_stored()?;
        let candidate_id = candidate.key_id.clone();
        let stored = store
            .insert_signing_key_if_absent(keys::PRIMARY_SLOT, candidate)
            .await?;

        if stored.key_id == candidate_id {
            info!(key_id = %stored.key_id, "Generated and stored new signing key");
        } else {
            warn!(
                key_id = %stored.key_id,
                discarded = %candidate_id,
                "Concurrent key initialization detected; using the stored key"
            );
        }

        SigningKeyPair::from_stored(&stored)
    }
}
