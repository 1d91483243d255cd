// ABOUTME: Application constants re-exported from the core crate
// ABOUTME: Keeps `crate::constants::*` paths stable for server modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants shared with `user-auth-core`.

pub use user_auth_core::constants::{headers, keys, lifetimes, oauth, ports, service_names};
