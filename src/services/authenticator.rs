// src/services/authenticator.rs
//! Administrator login.
//!
//! A login succeeds when the email is on the configured allow-list and the
//! shared password matches. The result is a signed session token carrying
//! the admin role, valid for the configured session lifetime.

use crate::models::claims::SessionClaims;
use crate::session::token_codec::{self, TokenError};
use crate::settings::Settings;
use crate::utils::crypto::constant_time_eq;
use thiserror::Error;

/// Failures of a login attempt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    /// A secret needed to log anyone in is missing
    #[error("server not configured (missing {0})")]
    NotConfigured(&'static str),

    /// Email not allowed or wrong password; the two are not distinguished
    #[error("invalid credentials")]
    Unauthorized,

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// An established admin session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub claims: SessionClaims,
    /// Lifetime in seconds, for the cookie `Max-Age`
    pub max_age_secs: i64,
}

/// Credential checker and session issuer.
#[derive(Clone)]
pub struct Authenticator {
    /// Normalized allow-list (trimmed, lower-case)
    allow_list: Vec<String>,
    admin_pass: Option<String>,
    secret: Option<String>,
    role: String,
    issuer: String,
    ttl_secs: i64,
}

impl Authenticator {
    /// Builds an authenticator from `settings`.
    pub fn new(settings: &Settings) -> Self {
        Authenticator {
            allow_list: settings.admin_allow_list(),
            admin_pass: settings.admin_pass().map(String::from),
            secret: settings.auth_secret().map(String::from),
            role: settings.admin_role.clone(),
            issuer: settings.token_issuer.clone(),
            ttl_secs: settings.session_ttl_secs,
        }
    }

    /// Checks `email` / `password` and issues a session at Unix time `now`.
    ///
    /// # Process Flow
    /// 1. Require the signing secret and the shared password to be configured
    /// 2. Normalize the email (trim, lower-case) and check the allow-list
    /// 3. Compare the password in constant time
    /// 4. Sign claims `{sub: email, role, iat/nbf: now, exp: now + ttl, iss}`
    pub fn login(&self, email: &str, password: &str, now: i64) -> Result<Session, LoginError> {
        let secret = self.secret.as_deref().ok_or(LoginError::NotConfigured("AUTH_SECRET"))?;
        let admin_pass = self
            .admin_pass
            .as_deref()
            .ok_or(LoginError::NotConfigured("ADMIN_PASS"))?;

        let email = email.trim().to_lowercase();
        if email.is_empty() || !self.allow_list.contains(&email) {
            log::debug!("Login refused: {:?} is not on the allow-list", email);
            return Err(LoginError::Unauthorized);
        }
        if !constant_time_eq(password.as_bytes(), admin_pass.as_bytes()) {
            log::debug!("Login refused: bad password for {}", email);
            return Err(LoginError::Unauthorized);
        }

        let claims = SessionClaims::new(&email, &self.role, &self.issuer, now, self.ttl_secs);
        let token = token_codec::sign(&claims, secret.as_bytes())?;
        log::info!("Admin session issued for {}", email);
        Ok(Session {
            token,
            claims,
            max_age_secs: self.ttl_secs,
        })
    }
}
