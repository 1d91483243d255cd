// ABOUTME: OAuth 2.0 authorization server: client registry, code store, and flow controller
// ABOUTME: Re-exports the request/response models consumed by the HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Single-use authorization codes
pub mod auth_codes;
/// Client registration and authentication
pub mod client_registration;
/// Protocol operations behind each endpoint
pub mod endpoints;
/// Request, response, and error shapes
pub mod models;

pub use auth_codes::{AuthorizationCodeStore, CodeConsumeError};
pub use client_registration::ClientRegistry;
pub use endpoints::{AuthorizationFlow, FlowSettings};
pub use models::{
    AuthorizeRequest, CallbackQuery, CallbackResponse, ClientCredentialsRequest,
    ClientCredentialsResponse, ClientRegistrationRequest, ClientRegistrationResponse,
    InviteResponse, LoginRequest, OAuth2Error, SignupRequest, TokenRequest, TokenResponse,
    VerifyTokenResponse,
};
