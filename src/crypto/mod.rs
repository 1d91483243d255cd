// ABOUTME: Cryptography module for key generation, randomness, and secret hashing
// ABOUTME: Centralizes ring and argon2 usage behind small typed helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Cryptographic helpers

/// Argon2 hashing for client secrets and passwords
pub mod hashing;

/// ECDSA P-256 key generation and URL-safe random tokens
pub mod keys;

pub use hashing::{hash_secret, verify_secret, verify_secret_or_dummy};
pub use keys::{generate_es256_keypair, public_point_from_pkcs8, random_urlsafe};
