// src/models/claims.rs
//! Session claims carried inside signed admin tokens.
//!
//! Field names follow the registered JWT claim names so the payload is a
//! standard JWT claims set.

use serde::{Deserialize, Serialize};

/// Claims of an administrator session.
///
/// Created once at login and never mutated. There is no server-side copy:
/// validity is computed from the signature and the time bounds on every
/// request.
///
/// # Fields
/// - `sub`: Identity of the session holder (the login email)
/// - `role`: Role granted to the session
/// - `iat`: Issued-at, Unix seconds
/// - `nbf`: Not-before, Unix seconds (bound skipped when absent)
/// - `exp`: Expiry, Unix seconds (bound skipped when absent)
/// - `iss`: Issuer name of the token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,

    pub role: String,

    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    pub iss: String,
}

impl SessionClaims {
    /// Builds claims valid from `now` for `ttl_secs` seconds.
    pub fn new(sub: &str, role: &str, iss: &str, now: i64, ttl_secs: i64) -> Self {
        SessionClaims {
            sub: sub.to_string(),
            role: role.to_string(),
            iat: now,
            nbf: Some(now),
            exp: Some(now + ttl_secs),
            iss: iss.to_string(),
        }
    }

    /// Returns `true` if `now` lies within `[nbf, exp]`.
    pub fn is_active_at(&self, now: i64) -> bool {
        let started = self.nbf.map_or(true, |nbf| nbf <= now);
        let not_expired = self.exp.map_or(true, |exp| now <= exp);
        started && not_expired
    }
}
