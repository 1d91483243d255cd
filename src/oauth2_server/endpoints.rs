// ABOUTME: Authorization flow controller tying client registry, code store, and token service together
// ABOUTME: Implements client credentials, authorize/callback/exchange, login, signup, and token checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Authorization Flow
//!
//! HTTP handlers parse requests and hand them to [`AuthorizationFlow`]. Each
//! operation validates its input before touching storage or crypto, and all
//! storage failures surface as opaque server errors.

use super::auth_codes::AuthorizationCodeStore;
use super::client_registration::ClientRegistry;
use super::models::{
    AuthorizeRequest, CallbackResponse, ClientCredentialsRequest, ClientCredentialsResponse,
    ClientRegistrationRequest, ClientRegistrationResponse, InviteResponse, LoginRequest,
    OAuth2Error, SignupRequest, TokenRequest, TokenResponse, UserTokens,
};
use crate::auth::{expiry_after, Claims, TokenManager, TokenUse};
use crate::config::ServerConfig;
use crate::constants::oauth::{
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, RESPONSE_TYPE_CODE, TOKEN_TYPE_BEARER,
};
use crate::crypto::verify_secret_or_dummy;
use crate::database::UserDirectory;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{Invite, InviteStatus, NewClient, NewUser, User};
use crate::notifications::{InviteNotification, Notifier};
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Query parameters that carry minted tokens on a login or signup redirect
const TOKEN_PARAMS: [&str; 3] = ["access_token", "id_token", "refresh_token"];

/// Settings the flow reads from the server configuration
#[derive(Debug, Clone)]
pub struct FlowSettings {
    /// How long a signup invite stays valid, in hours
    pub invite_ttl_hours: i64,
    /// Externally visible base URL, used in magic links
    pub public_base_url: String,
    /// Upper bound on the signup notification call
    pub notification_timeout: std::time::Duration,
}

impl FlowSettings {
    /// Derive settings from the server configuration
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            invite_ttl_hours: config.auth.invite_ttl_hours,
            public_base_url: config.public_base_url.trim_end_matches('/').to_owned(),
            notification_timeout: std::time::Duration::from_secs(
                config.notifications.timeout_secs,
            ),
        }
    }
}

/// The authorization server's protocol logic
#[derive(Clone)]
pub struct AuthorizationFlow {
    clients: ClientRegistry,
    codes: AuthorizationCodeStore,
    tokens: Arc<TokenManager>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    settings: FlowSettings,
}

impl AuthorizationFlow {
    /// Assemble the flow from its collaborators
    #[must_use]
    pub fn new(
        clients: ClientRegistry,
        codes: AuthorizationCodeStore,
        tokens: Arc<TokenManager>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            clients,
            codes,
            tokens,
            users,
            notifier,
            settings,
        }
    }

    /// Exchange client credentials for an access token (`POST /oauth/token`)
    ///
    /// # Errors
    ///
    /// `InvalidInput` when a field is missing, `AuthInvalid` ("Unauthorized")
    /// for bad credentials, or a storage/internal error
    pub async fn client_credentials_token(
        &self,
        request: ClientCredentialsRequest,
    ) -> AppResult<ClientCredentialsResponse> {
        if request.client_id.is_empty() || request.client_secret.is_empty() {
            return Err(AppError::invalid_input(
                "client_id and client_secret are required",
            ));
        }

        match self
            .clients
            .authenticate_client(&request.client_id, &request.client_secret)
            .await
        {
            Ok(_) => {}
            Err(e) if e.code == ErrorCode::AuthInvalid => {
                return Err(AppError::auth_invalid("Unauthorized"));
            }
            Err(e) => return Err(e),
        }

        let token = self.tokens.issue_access_token(&request.client_id)?;
        info!(client_id = %request.client_id, "Issued client credentials token");
        Ok(ClientCredentialsResponse { token })
    }

    /// Register a client with a server-generated secret (`POST /register-client`)
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a missing id or malformed redirect URI,
    /// `ResourceAlreadyExists` for a taken id, or a storage error
    pub async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> AppResult<ClientRegistrationResponse> {
        let client_id = request.client_id.trim().to_owned();
        if client_id.is_empty() {
            return Err(AppError::missing_field("client_id"));
        }
        if let Some(uri) = &request.redirect_uri {
            if !ClientRegistry::is_valid_redirect_uri(uri) {
                return Err(AppError::invalid_input(
                    "redirect_uri must be an absolute http(s) URL",
                ));
            }
        }

        let client_secret = ClientRegistry::generate_client_secret()?;
        let registered = self
            .clients
            .register_client(NewClient {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                redirect_uri: request.redirect_uri,
            })
            .await?;

        if !registered {
            return Err(AppError::already_exists("Client already exists"));
        }

        Ok(ClientRegistrationResponse {
            client_id,
            client_secret,
        })
    }

    /// Issue an authorization code and build the redirect (`GET /authorize`)
    ///
    /// The client must exist. When it registered a redirect URI, the request
    /// must match it exactly. A client that registered none is bound to the
    /// first absolute http(s) URL it authorizes with.
    ///
    /// # Errors
    ///
    /// `invalid_request`, `unsupported_response_type`, `invalid_client`, or
    /// `server_error`
    pub async fn authorize(&self, request: AuthorizeRequest) -> Result<Url, OAuth2Error> {
        if request.response_type.is_empty()
            || request.client_id.is_empty()
            || request.redirect_uri.is_empty()
        {
            return Err(OAuth2Error::invalid_request(
                "client_id, redirect_uri, and response_type are required",
            ));
        }
        if request.response_type != RESPONSE_TYPE_CODE {
            return Err(OAuth2Error::unsupported_response_type());
        }

        let client = match self.clients.get_client_by_id(&request.client_id).await {
            Ok(client) => client,
            Err(e) if e.code == ErrorCode::ResourceNotFound => {
                warn!(client_id = %request.client_id, "Authorization requested for unknown client");
                return Err(OAuth2Error::invalid_client_request());
            }
            Err(e) => {
                error!(client_id = %request.client_id, error = %e, "Unable to retrieve client data");
                return Err(OAuth2Error::server_error());
            }
        };

        let redirect_allowed = match client.redirect_uri.as_deref() {
            Some(registered) => registered == request.redirect_uri,
            None if ClientRegistry::is_valid_redirect_uri(&request.redirect_uri) => {
                let bound = self
                    .clients
                    .bind_redirect_uri(&client.client_id, &request.redirect_uri)
                    .await
                    .map_err(|e| {
                        error!(client_id = %client.client_id, error = %e, "Failed to bind redirect URI");
                        OAuth2Error::server_error()
                    })?;
                bound == request.redirect_uri
            }
            None => false,
        };
        if !redirect_allowed {
            warn!(client_id = %request.client_id, "Redirect URI rejected");
            return Err(OAuth2Error::invalid_client_request());
        }
        let mut redirect =
            Url::parse(&request.redirect_uri).map_err(|_| OAuth2Error::invalid_client_request())?;

        let code = self
            .codes
            .issue_code(&client.client_id, &request.redirect_uri)
            .await
            .map_err(|e| {
                error!(client_id = %client.client_id, error = %e, "Failed to store authorization code");
                OAuth2Error::server_error()
            })?;

        {
            let mut query = redirect.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = &request.state {
                query.append_pair("state", state);
            }
        }

        info!(client_id = %client.client_id, "Issued authorization code");
        Ok(redirect)
    }

    /// Acknowledge a delivered code without consuming it (`GET /callback`)
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the code is missing
    pub fn callback(&self, code: &str) -> AppResult<CallbackResponse> {
        if code.is_empty() {
            return Err(AppError::invalid_input("Authorization code missing"));
        }
        Ok(CallbackResponse {
            message: "Authorization successful".to_owned(),
            authorization_code: code.to_owned(),
        })
    }

    /// Redeem an authorization code or refresh token (`POST /token`)
    ///
    /// # Errors
    ///
    /// `invalid_request`, `invalid_client`, `invalid_grant`,
    /// `unsupported_grant_type`, or `server_error`
    pub async fn exchange_token(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let grant_type = request
            .grant_type
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(GRANT_AUTHORIZATION_CODE);

        match grant_type {
            GRANT_AUTHORIZATION_CODE => self.exchange_authorization_code(&request).await,
            GRANT_REFRESH_TOKEN => self.exchange_refresh_token(&request).await,
            other => {
                debug!(grant_type = %other, "Unsupported grant type");
                Err(OAuth2Error::unsupported_grant_type())
            }
        }
    }

    async fn exchange_authorization_code(
        &self,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = request.code.as_deref().unwrap_or_default();
        if request.client_id.is_empty() || request.client_secret.is_empty() || code.is_empty() {
            return Err(OAuth2Error::invalid_request(
                "client_id, client_secret, and code are required",
            ));
        }

        let record = self
            .clients
            .authenticate_client_with_code(
                &request.client_id,
                &request.client_secret,
                code,
                &self.codes,
            )
            .await?;

        if let Some(redirect_uri) = request.redirect_uri.as_deref() {
            if redirect_uri != record.redirect_uri {
                warn!(client_id = %request.client_id, "Redirect URI differs from authorization request");
                return Err(OAuth2Error::invalid_client());
            }
        }

        let access_token = self.tokens.issue_access_token(&request.client_id)?;
        let refresh_token = self.tokens.issue_refresh_token(&request.client_id)?;
        info!(client_id = %request.client_id, "Exchanged authorization code for tokens");

        Ok(TokenResponse {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: self.tokens.access_token_ttl_secs(),
            refresh_token: Some(refresh_token),
        })
    }

    async fn exchange_refresh_token(
        &self,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let refresh_token = request.refresh_token.as_deref().unwrap_or_default();
        if request.client_id.is_empty()
            || request.client_secret.is_empty()
            || refresh_token.is_empty()
        {
            return Err(OAuth2Error::invalid_request(
                "client_id, client_secret, and refresh_token are required",
            ));
        }

        self.clients
            .authenticate_client(&request.client_id, &request.client_secret)
            .await?;

        let claims = self
            .tokens
            .verify_token_for(refresh_token, TokenUse::Refresh, &request.client_id)
            .map_err(|e| {
                warn!(client_id = %request.client_id, reason = %e, "Refresh token rejected");
                OAuth2Error::invalid_grant("Invalid refresh token")
            })?;

        let access_token = self
            .tokens
            .issue_access_token_for(&claims.sub, &request.client_id)?;
        info!(client_id = %request.client_id, "Refreshed access token");

        Ok(TokenResponse {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: self.tokens.access_token_ttl_secs(),
            refresh_token: None,
        })
    }

    /// Authenticate a user by email and password (`POST /login`)
    ///
    /// Returns the redirect URL carrying the minted tokens.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a missing redirect URI, client id, or an unparsable
    /// redirect URI; `AuthInvalid` ("Unauthorized") for bad credentials
    pub async fn login(&self, client_id: Option<&str>, request: LoginRequest) -> AppResult<Url> {
        let (client_id, redirect) = Self::validate_user_request(client_id, &request.redirect_uri)?;
        Self::validate_credentials(&request.email, &request.password)?;

        let user = self.users.find_by_email(&request.email).await?;
        let authenticated = match &user {
            Some(user) => self.users.verify_password(user, &request.password).await?,
            None => verify_secret_or_dummy(&request.password, None).await?,
        };
        let Some(user) = user.filter(|_| authenticated) else {
            warn!(client_id = %client_id, "Login failed");
            return Err(AppError::auth_invalid("Unauthorized"));
        };

        let tokens = self.issue_user_tokens(&user, client_id)?;
        info!(client_id = %client_id, user_id = %user.id, "User logged in");
        Ok(Self::redirect_with_tokens(redirect, &tokens))
    }

    /// Create a user, send their invite, and sign them in (`POST /signup`)
    ///
    /// The notification is best effort: failures and timeouts are logged and
    /// the signup proceeds.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for missing or malformed input, `ResourceAlreadyExists`
    /// for a taken email, or a storage error
    pub async fn sign_up(&self, client_id: Option<&str>, request: SignupRequest) -> AppResult<Url> {
        let (client_id, redirect) = Self::validate_user_request(client_id, &request.redirect_uri)?;
        Self::validate_credentials(&request.email, &request.password)?;
        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AppError::already_exists("User already exists"));
        }

        let now = Utc::now();
        let expires_at = expiry_after(now, TimeDelta::try_hours(self.settings.invite_ttl_hours))?;
        let invite = Invite {
            invite_id: Uuid::new_v4(),
            status: InviteStatus::Pending,
            email: request.email.trim().to_owned(),
            created_at: now,
            expires_at,
        };
        self.users.create_invite(&invite).await?;

        self.notify_invite(InviteNotification {
            email: invite.email.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            magic_link: format!("{}/invite/{}", self.settings.public_base_url, invite.invite_id),
        })
        .await;

        let user = self
            .users
            .create_user(NewUser {
                email: request.email,
                password: request.password,
                first_name: request.first_name,
                last_name: request.last_name,
                profile: request.profile,
            })
            .await?;

        let tokens = self.issue_user_tokens(&user, client_id)?;
        info!(client_id = %client_id, user_id = %user.id, "User signed up");
        Ok(Self::redirect_with_tokens(redirect, &tokens))
    }

    async fn notify_invite(&self, notification: InviteNotification) {
        match tokio::time::timeout(
            self.settings.notification_timeout,
            self.notifier.send_invite(&notification),
        )
        .await
        {
            Ok(Ok(())) => debug!(email = %notification.email, "Invite notification sent"),
            Ok(Err(e)) => warn!(email = %notification.email, error = %e, "Invite notification failed"),
            Err(_) => warn!(email = %notification.email, "Invite notification timed out"),
        }
    }

    /// Verify a bearer token (`GET /verify-token`)
    ///
    /// # Errors
    ///
    /// `AuthExpired` for an expired token, `AuthInvalid` or `AuthMalformed`
    /// otherwise
    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        self.tokens.verify_token(token).map_err(|e| {
            debug!(reason = %e, "Bearer token rejected");
            AppError::from(e)
        })
    }

    /// Look up a signup invite (`GET /invite/{invite_id}`)
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` for an unknown invite, `InvalidInput` for an expired one
    pub async fn check_invite(&self, invite_id: &str) -> AppResult<InviteResponse> {
        let invite_id = Uuid::parse_str(invite_id).map_err(|_| AppError::not_found("Invite"))?;
        let invite = self
            .users
            .get_invite(invite_id)
            .await?
            .ok_or_else(|| AppError::not_found("Invite"))?;

        if invite.is_expired_at(Utc::now()) {
            return Err(AppError::invalid_input("Invite link has expired"));
        }

        Ok(InviteResponse {
            message: "Invite is valid".to_owned(),
            invite,
        })
    }

    fn validate_user_request<'a>(
        client_id: Option<&'a str>,
        redirect_uri: &str,
    ) -> AppResult<(&'a str, Url)> {
        if redirect_uri.is_empty() {
            return Err(AppError::invalid_input("RedirectURI is required"));
        }
        let client_id = client_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::invalid_input("Client-Id header is required"))?;
        let redirect =
            Url::parse(redirect_uri).map_err(|_| AppError::invalid_input("Invalid redirect URI"))?;
        Ok((client_id, redirect))
    }

    fn validate_credentials(email: &str, password: &str) -> AppResult<()> {
        if email.trim().is_empty() {
            return Err(AppError::missing_field("email"));
        }
        if password.is_empty() {
            return Err(AppError::missing_field("password"));
        }
        Ok(())
    }

    fn issue_user_tokens(&self, user: &User, client_id: &str) -> AppResult<UserTokens> {
        Ok(UserTokens {
            access_token: self.tokens.issue_access_token_for(&user.email, client_id)?,
            id_token: self
                .tokens
                .issue_id_token(&user.email, client_id, &user.payload())?,
            refresh_token: self.tokens.issue_refresh_token_for(&user.email, client_id)?,
        })
    }

    fn redirect_with_tokens(mut redirect: Url, tokens: &UserTokens) -> Url {
        let retained: Vec<(String, String)> = redirect
            .query_pairs()
            .filter(|(key, _)| !TOKEN_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        redirect
            .query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair("access_token", &tokens.access_token)
            .append_pair("id_token", &tokens.id_token)
            .append_pair("refresh_token", &tokens.refresh_token);
        redirect
    }
}
