// src/settings.rs
//! Runtime configuration for the badge registry service.
//!
//! All settings are read once at start-up from the process environment
//! (optionally seeded from a `.env` file) and then passed around by reference.
//! Components never read the environment themselves.
//!
//! ## Environment Variables
//! - `AUTH_SECRET`: HMAC key used to sign session tokens (required)
//! - `ADMIN_PASS`: Shared administrator password (required for login)
//! - `ADMIN_EMAILS`: Comma-separated allow-list of administrator emails
//! - `GITHUB_TOKEN`: Token with write access to the registry repository (required for issuance)
//! - `GITHUB_OWNER` / `GITHUB_REPO` / `GITHUB_BRANCH`: Registry repository coordinates
//! - `SITE_ORIGIN`: Origin allowed by CORS
//! - `SITE_BASE`: Public site URL used to build badge verification links

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Service configuration.
///
/// Secrets are optional at load time: a missing secret only disables the
/// routes that need it, and those routes answer with a configuration error.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Socket address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Single origin allowed to call the API with credentials
    #[serde(default = "default_site_origin")]
    pub site_origin: String,

    /// Public site URL; verification links are `<site_base>#id=<id>`
    #[serde(default = "default_site_base")]
    pub site_base: String,

    /// HMAC-SHA256 key for session tokens
    #[serde(default)]
    pub auth_secret: Option<String>,

    /// Shared administrator password
    #[serde(default)]
    pub admin_pass: Option<String>,

    /// Comma-separated list of administrator emails
    #[serde(default)]
    pub admin_emails: String,

    /// Role written into issued tokens and required by the session gate
    #[serde(default = "default_admin_role")]
    pub admin_role: String,

    /// `iss` claim of issued tokens
    #[serde(default = "default_token_issuer")]
    pub token_issuer: String,

    /// Session lifetime, used for both the token `exp` and the cookie `Max-Age`
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,

    /// Registry backend: `github` or `memory` (local runs, nothing persisted)
    #[serde(default = "default_store_backend")]
    pub store_backend: String,

    /// GitHub API token used by the registry store
    #[serde(default)]
    pub github_token: Option<String>,

    #[serde(default = "default_github_owner")]
    pub github_owner: String,

    #[serde(default = "default_github_repo")]
    pub github_repo: String,

    #[serde(default = "default_github_branch")]
    pub github_branch: String,

    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,

    /// Upper bound for a single store request
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// Repository directory holding badge records and `registry.json`
    #[serde(default = "default_registry_dir")]
    pub registry_dir: String,

    #[serde(default = "default_issuer_name")]
    pub issuer_name: String,

    #[serde(default)]
    pub issuer_website: String,

    #[serde(default = "default_badge_name")]
    pub default_badge_name: String,

    #[serde(default = "default_badge_image")]
    pub default_badge_image: String,

    /// Total registry write attempts before a version conflict is reported
    #[serde(default = "default_max_registry_attempts")]
    pub max_registry_attempts: u32,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".into()
}

fn default_site_origin() -> String {
    "https://anu1209823.github.io".into()
}

fn default_site_base() -> String {
    "https://anu1209823.github.io/digital-badge-system/site/".into()
}

fn default_admin_role() -> String {
    "admin".into()
}

fn default_token_issuer() -> String {
    "BugBox-Admin".into()
}

fn default_session_ttl_secs() -> i64 {
    60 * 60 * 24
}

fn default_store_backend() -> String {
    "github".into()
}

fn default_github_owner() -> String {
    "Anu1209823".into()
}

fn default_github_repo() -> String {
    "digital-badge-system".into()
}

fn default_github_branch() -> String {
    "main".into()
}

fn default_github_api_base() -> String {
    "https://api.github.com".into()
}

fn default_store_timeout_secs() -> u64 {
    15
}

fn default_registry_dir() -> String {
    "registry".into()
}

fn default_issuer_name() -> String {
    "BugBox".into()
}

fn default_badge_name() -> String {
    "BugBox \u{2013} Certified Badge".into()
}

fn default_badge_image() -> String {
    "assets/badges/sample.png".into()
}

fn default_max_registry_attempts() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: default_bind_addr(),
            site_origin: default_site_origin(),
            site_base: default_site_base(),
            auth_secret: None,
            admin_pass: None,
            admin_emails: String::new(),
            admin_role: default_admin_role(),
            token_issuer: default_token_issuer(),
            session_ttl_secs: default_session_ttl_secs(),
            store_backend: default_store_backend(),
            github_token: None,
            github_owner: default_github_owner(),
            github_repo: default_github_repo(),
            github_branch: default_github_branch(),
            github_api_base: default_github_api_base(),
            store_timeout_secs: default_store_timeout_secs(),
            registry_dir: default_registry_dir(),
            issuer_name: default_issuer_name(),
            issuer_website: String::new(),
            default_badge_name: default_badge_name(),
            default_badge_image: default_badge_image(),
            max_registry_attempts: default_max_registry_attempts(),
        }
    }
}

impl Settings {
    /// Loads settings from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` when a variable is present but cannot be
    /// converted to the field type (e.g. a non-numeric `SESSION_TTL_SECS`).
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    /// Token signing secret, if configured and non-empty.
    pub fn auth_secret(&self) -> Option<&str> {
        non_empty(&self.auth_secret)
    }

    /// Shared admin password, if configured and non-empty.
    pub fn admin_pass(&self) -> Option<&str> {
        non_empty(&self.admin_pass)
    }

    /// GitHub token, if configured and non-empty.
    pub fn github_token(&self) -> Option<&str> {
        non_empty(&self.github_token)
    }

    /// Normalized (trimmed, lower-cased) administrator allow-list.
    pub fn admin_allow_list(&self) -> Vec<String> {
        self.admin_emails
            .split(',')
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Names of the required secrets that are missing.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.auth_secret().is_none() {
            missing.push("AUTH_SECRET");
        }
        if self.admin_pass().is_none() {
            missing.push("ADMIN_PASS");
        }
        if self.store_backend == "github" && self.github_token().is_none() {
            missing.push("GITHUB_TOKEN");
        }
        missing
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_is_normalized() {
        let settings = Settings {
            admin_emails: " Admin@Example.com, ,ops@example.com ".into(),
            ..Settings::default()
        };
        assert_eq!(
            settings.admin_allow_list(),
            vec!["admin@example.com".to_string(), "ops@example.com".to_string()]
        );
    }

    #[test]
    fn test_empty_secrets_count_as_missing() {
        let settings = Settings {
            auth_secret: Some(String::new()),
            admin_pass: Some("pw".into()),
            ..Settings::default()
        };
        assert!(settings.auth_secret().is_none());
        assert_eq!(settings.missing_secrets(), vec!["AUTH_SECRET", "GITHUB_TOKEN"]);
    }

    #[test]
    fn test_defaults_match_deployment() {
        let settings = Settings::default();
        assert_eq!(settings.session_ttl_secs, 86_400);
        assert_eq!(settings.admin_role, "admin");
        assert_eq!(settings.max_registry_attempts, 3);
    }
}
