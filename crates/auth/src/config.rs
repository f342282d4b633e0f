//! Route and URL settings for the session layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be an absolute path starting with '/', got '{value}'")]
    NotAbsolutePath { key: &'static str, value: String },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },

    #[error("{key} must be an http(s) URL, got '{value}'")]
    InvalidUrl { key: &'static str, value: String },
}

/// Paths the route gate and sign-in helpers navigate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Where unauthenticated visitors are sent.
    pub login_path: String,
    /// Safe landing route after sign-in and on access denial.
    pub default_route: String,
    /// Query parameter carrying the originally requested path.
    pub redirect_param: String,
    pub password_reset_path: String,
    pub oauth_callback_path: String,
    /// Public origin used to build absolute `redirect_to` URLs.
    pub site_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            default_route: "/dashboard".to_string(),
            redirect_param: "redirect".to_string(),
            password_reset_path: "/reset-password".to_string(),
            oauth_callback_path: "/auth/callback".to_string(),
            site_url: "http://localhost:5173".to_string(),
        }
    }
}

impl AuthConfig {
    /// Load from `CHAMBERHUB_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, default: String| lookup(key).unwrap_or(default);

        let config = Self {
            login_path: get("CHAMBERHUB_LOGIN_PATH", defaults.login_path),
            default_route: get("CHAMBERHUB_DEFAULT_ROUTE", defaults.default_route),
            redirect_param: get("CHAMBERHUB_REDIRECT_PARAM", defaults.redirect_param),
            password_reset_path: get("CHAMBERHUB_PASSWORD_RESET_PATH", defaults.password_reset_path),
            oauth_callback_path: get("CHAMBERHUB_OAUTH_CALLBACK_PATH", defaults.oauth_callback_path),
            site_url: get("CHAMBERHUB_SITE_URL", defaults.site_url),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("login_path", &self.login_path),
            ("default_route", &self.default_route),
            ("password_reset_path", &self.password_reset_path),
            ("oauth_callback_path", &self.oauth_callback_path),
        ] {
            if !value.starts_with('/') {
                return Err(ConfigError::NotAbsolutePath {
                    key,
                    value: value.clone(),
                });
            }
        }
        if self.redirect_param.is_empty() {
            return Err(ConfigError::Empty {
                key: "redirect_param",
            });
        }
        if !(self.site_url.starts_with("http://") || self.site_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                key: "site_url",
                value: self.site_url.clone(),
            });
        }
        Ok(())
    }

    /// Absolute URL for a path on this site.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), path)
    }
}
