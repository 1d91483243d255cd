// ABOUTME: Outbound notifications sent when a user signs up
// ABOUTME: HTTP delivery to the notification service, or a no-op when none is configured
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Notifications
//!
//! Signup hands the invitee's magic link to a [`Notifier`]. Delivery is best
//! effort: callers bound it with a timeout and log failures instead of
//! failing the request.

use crate::config::NotificationConfig;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Invite message for a new user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteNotification {
    /// Recipient email
    pub email: String,
    /// Recipient given name
    pub first_name: String,
    /// Recipient family name
    pub last_name: String,
    /// Link that opens the invite
    pub magic_link: String,
}

/// Delivers invite notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one invite
    async fn send_invite(&self, notification: &InviteNotification) -> AppResult<()>;
}

/// Posts invites as JSON to `{base_url}/notifications/send`
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    /// Create a notifier targeting `base_url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns a config error if `base_url` is not an absolute URL or the
    /// HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let endpoint = format!("{}/notifications/send", base_url.trim_end_matches('/'));
        Url::parse(&endpoint).map_err(|e| {
            AppError::config(format!("Invalid notification base URL {base_url:?}: {e}"))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build notification client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// Full URL invites are posted to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_invite(&self, notification: &InviteNotification) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external_service(
                "notifications",
                format!("notification service returned {status}"),
            ));
        }

        debug!(email = %notification.email, "Invite notification delivered");
        Ok(())
    }
}

/// Drops every notification
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_invite(&self, notification: &InviteNotification) -> AppResult<()> {
        debug!(email = %notification.email, "No notification service configured; invite not sent");
        Ok(())
    }
}

/// Pick the notifier for this deployment
///
/// # Errors
///
/// Returns a config error if the configured HTTP notifier cannot be built
pub fn notifier_from_config(config: &NotificationConfig) -> AppResult<Arc<dyn Notifier>> {
    match &config.base_url {
        Some(base_url) => {
            let notifier = HttpNotifier::new(base_url, Duration::from_secs(config.timeout_secs))?;
            info!(endpoint = %notifier.endpoint(), "Invite notifications enabled");
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(NoopNotifier)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let notifier = HttpNotifier::new("https://notify.example.com/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            notifier.endpoint(),
            "https://notify.example.com/notifications/send"
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        let notifier = HttpNotifier::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let result = notifier
            .send_invite(&InviteNotification {
                email: "ada@example.com".to_owned(),
                first_name: "Ada".to_owned(),
                last_name: "Lovelace".to_owned(),
                magic_link: "https://auth.example.com/invite/1".to_owned(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_noop_always_succeeds() {
        let notification = InviteNotification {
            email: "ada@example.com".to_owned(),
            first_name: String::new(),
            last_name: String::new(),
            magic_link: String::new(),
        };
        assert!(NoopNotifier.send_invite(&notification).await.is_ok());
    }

    #[test]
    fn test_invalid_base_url_is_a_config_error() {
        let error = HttpNotifier::new("notify.internal", Duration::from_secs(1))
            .err()
            .unwrap();
        assert_eq!(error.code, crate::errors::ErrorCode::ConfigError);

        let config = NotificationConfig {
            base_url: Some("::not a url::".to_owned()),
            timeout_secs: 1,
        };
        assert!(notifier_from_config(&config).is_err());
    }

    #[test]
    fn test_notifier_selection() {
        let disabled = NotificationConfig {
            base_url: None,
            timeout_secs: 1,
        };
        assert!(notifier_from_config(&disabled).is_ok());

        let enabled = NotificationConfig {
            base_url: Some("http://notify.internal".to_owned()),
            timeout_secs: 1,
        };
        assert!(notifier_from_config(&enabled).is_ok());
    }
}
