//! Identity-service boundary.
//!
//! The hosted identity service owns credentials, tokens and session
//! persistence. This crate only calls it and listens to its change feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use chamberhub_core::User;

use crate::AuthError;

/// An authenticated session issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Kind of change reported on the identity service's change feed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// One notification from the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Account created and signed in immediately.
    SignedIn(Session),
    /// Account created; the user must follow the emailed link first.
    ConfirmationRequired { email: String },
}

/// Third-party sign-in providers enabled for the platform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProvider {
    Google,
    Azure,
    LinkedIn,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Azure => "azure",
            OAuthProvider::LinkedIn => "linkedin_oidc",
        }
    }
}

impl core::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to send the browser to start a provider sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRedirect {
    pub provider: OAuthProvider,
    pub url: String,
}

/// Hosted identity service.
///
/// All operations are opaque async calls returning a session or a typed
/// [`AuthError`]. Implementations are expected to publish an
/// [`AuthStateChange`] for every session transition they perform.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The persisted session, if any.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<OAuthRedirect, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str)
    -> Result<(), AuthError>;

    /// Subscribe to the change feed.
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;
}
