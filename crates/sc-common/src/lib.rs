//! SocialConnect shared types
//!
//! The connection value exchanged with the login framework, and logging setup.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;

pub mod logging;

// ============================================================================
// Connection Identity
// ============================================================================

/// Identifies a connection by the provider and the identity the provider
/// assigned to the user. Unique only within a single local user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionKey {
    pub provider_id: String,
    pub provider_user_id: String,
}

impl ConnectionKey {
    pub fn new(provider_id: impl Into<String>, provider_user_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider_user_id: provider_user_id.into(),
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_id, self.provider_user_id)
    }
}

// ============================================================================
// Connection Value
// ============================================================================

/// The connection value handed to and received from the login framework.
///
/// Carries everything needed to talk to the provider on the user's behalf,
/// plus a snapshot of the provider profile. It knows nothing about the local
/// user or the rank the connection holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    pub provider_id: String,
    pub provider_user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    /// OAuth1 token secret
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token expiry in epoch milliseconds
    #[serde(default)]
    pub expire_time: Option<i64>,
}

impl ConnectionData {
    pub fn new(provider_id: impl Into<String>, provider_user_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider_user_id: provider_user_id.into(),
            display_name: None,
            profile_url: None,
            image_url: None,
            access_token: None,
            secret: None,
            refresh_token: None,
            expire_time: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_expire_time(mut self, expire_time: i64) -> Self {
        self.expire_time = Some(expire_time);
        self
    }

    pub fn key(&self) -> ConnectionKey {
        ConnectionKey::new(self.provider_id.clone(), self.provider_user_id.clone())
    }

    /// Whether the access token had expired at `now`. Connections without an
    /// expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expire_time {
            Some(expire_time) => expire_time <= now.timestamp_millis(),
            None => false,
        }
    }

    pub fn has_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Display for ConnectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}, {}, {}}}",
            self.provider_id,
            self.provider_user_id,
            self.display_name.as_deref().unwrap_or("")
        )
    }
}
