// ABOUTME: Argon2id hashing for client secrets and user passwords
// ABOUTME: Verification runs in constant time and masks unknown identities with a dummy hash
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::{AppError, AppResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;

/// Hash compared against when the identity is unknown
static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

fn hash_blocking(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("Argon2 hashing failed: {e}")))
}

fn verify_blocking(secret: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Hash a secret with Argon2id and a random salt
///
/// Runs on the blocking pool.
///
/// # Errors
///
/// Returns an internal error if hashing fails or the blocking task is lost
pub async fn hash_secret(secret: &str) -> AppResult<String> {
    let secret = secret.to_owned();
    tokio::task::spawn_blocking(move || hash_blocking(&secret))
        .await
        .map_err(|e| AppError::internal(format!("Secret hashing task failed: {e}")))?
}

/// Verify a secret against a stored Argon2 PHC string
///
/// An unparsable stored hash verifies as `false`.
///
/// # Errors
///
/// Returns an internal error if the blocking task is lost
pub async fn verify_secret(secret: &str, stored_hash: &str) -> AppResult<bool> {
    let secret = secret.to_owned();
    let stored_hash = stored_hash.to_owned();
    tokio::task::spawn_blocking(move || verify_blocking(&secret, &stored_hash))
        .await
        .map_err(|e| AppError::internal(format!("Secret verification task failed: {e}")))
}

/// Verify against `stored_hash`, or burn equivalent work when there is none
///
/// Keeps the response time of "unknown id" close to "wrong secret".
///
/// # Errors
///
/// Returns an internal error if the blocking task is lost
pub async fn verify_secret_or_dummy(secret: &str, stored_hash: Option<&str>) -> AppResult<bool> {
    let secret = secret.to_owned();
    let stored_hash = stored_hash.map(str::to_owned);
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_blocking(&secret, &hash),
        None => {
            let dummy = DUMMY_HASH.get_or_init(|| hash_blocking("dummy-secret-for-timing").ok());
            if let Some(hash) = dummy {
                let _ = verify_blocking(&secret, hash);
            }
            false
        }
    })
    .await
    .map_err(|e| AppError::internal(format!("Secret verification task failed: {e}")))
}
