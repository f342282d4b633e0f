//! Error types for the identity and data collaborators.

use thiserror::Error;

/// Identity-service failure.
///
/// Each credential problem the identity service distinguishes has its own
/// variant so the sign-in screen can show a specific message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Please confirm your email address before signing in.")]
    EmailNotConfirmed,

    #[error("Too many attempts. Please wait and try again.")]
    RateLimited {
        /// Seconds the identity service asked callers to wait, if it said.
        retry_after_secs: Option<u64>,
    },

    #[error("An account with this email already exists.")]
    UserAlreadyRegistered,

    #[error("Password does not meet the strength requirements: {0}")]
    WeakPassword(String),

    #[error("Sign-in with {0} is not available.")]
    OAuthProviderUnavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("identity service error: {0}")]
    Backend(String),
}

impl AuthError {
    /// Stable machine-readable code, for UI lookups and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::EmailNotConfirmed => "email_not_confirmed",
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::UserAlreadyRegistered => "user_already_registered",
            AuthError::WeakPassword(_) => "weak_password",
            AuthError::OAuthProviderUnavailable(_) => "oauth_provider_unavailable",
            AuthError::Network(_) => "network",
            AuthError::Backend(_) => "backend",
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::RateLimited { .. } | AuthError::Network(_) | AuthError::Backend(_)
        )
    }
}

/// Data-store read failure.
///
/// Never surfaced to end users: the auth context degrades these to "absent".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("data store error: {0}")]
    Backend(String),
}
