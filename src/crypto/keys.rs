// ABOUTME: ECDSA P-256 key generation and URL-safe random token generation
// ABOUTME: Uses ring for key material and the system CSPRNG
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Key material for ES256 signing and opaque random tokens

use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use zeroize::Zeroize;

/// Length of an uncompressed SEC1 P-256 point (0x04 || X || Y)
pub const P256_PUBLIC_POINT_LEN: usize = 65;

/// Generate a fresh P-256 key pair
///
/// Returns the PKCS#8 DER private key and the uncompressed public point.
///
/// # Errors
///
/// Returns an internal error if the system RNG or key generation fails
pub fn generate_es256_keypair() -> AppResult<(Vec<u8>, Vec<u8>)> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)?;
    let private_der = pkcs8.as_ref().to_vec();
    let public_point = public_point_from_pkcs8(&private_der)?;
    Ok((private_der, public_point))
}

/// Derive the uncompressed public point from a PKCS#8 private key
///
/// Also serves as a validity check for key material loaded from storage.
///
/// # Errors
///
/// Returns an internal error if the document is not a P-256 PKCS#8 key
pub fn public_point_from_pkcs8(private_der: &[u8]) -> AppResult<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, private_der, &rng)
        .map_err(|e| AppError::internal(format!("Rejected ECDSA private key: {e}")))?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

/// Generate `byte_len` random bytes encoded as unpadded base64url
///
/// # Errors
///
/// Returns an internal error if the system RNG fails
pub fn random_urlsafe(byte_len: usize) -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; byte_len];
    rng.fill(&mut bytes)?;
    let encoded = URL_SAFE_NO_PAD.encode(&bytes);
    bytes.zeroize();
    Ok(encoded)
}
