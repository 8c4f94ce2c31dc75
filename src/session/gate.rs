// src/session/gate.rs
//! Authorization boundary for mutating routes.
//!
//! The gate pulls the session token out of the `bb_auth` cookie, verifies it
//! with the token codec and admits the request only when the decoded role is
//! the configured admin role. It also produces the `Set-Cookie` directives
//! used by login and logout.

use crate::models::claims::SessionClaims;
use crate::session::token_codec::{self, TokenError};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use thiserror::Error;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "bb_auth";

/// Outcome of a rejected authorization.
///
/// Carries no detail on purpose: a bad signature, an expired token and a
/// wrong role all look the same to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("unauthorized")]
    Unauthorized,
}

/// Returns the value of cookie `name`, percent-decoded.
///
/// Every `Cookie` header is scanned. Pairs are separated by `;` and each pair
/// is split on its first `=`, so values may themselves contain `=`.
/// Returns `None` if the cookie is absent or its value is empty.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .and_then(|(_, raw)| urlencoding::decode(raw.trim()).ok())
        .map(|decoded| decoded.into_owned())
        .filter(|value| !value.is_empty())
}

/// Authorizes a request credential for `required_role` at Unix time `now`.
///
/// # Arguments
/// * `credential` - Token taken from the request, if any
/// * `secret` - Token signing secret
/// * `required_role` - Role the session must carry
///
/// # Returns
/// The verified claims, or `GateError::Unauthorized` for a missing credential,
/// any verification failure, or a role mismatch.
pub fn authorize(
    credential: Option<&str>,
    secret: &[u8],
    required_role: &str,
    now: i64,
) -> Result<SessionClaims, GateError> {
    let token = credential.ok_or(GateError::Unauthorized)?;
    let claims = token_codec::verify_at(token, secret, now).map_err(|e: TokenError| {
        log::debug!("Rejected session token: {}", e);
        GateError::Unauthorized
    })?;
    if claims.role != required_role {
        log::debug!("Rejected session for {}: role {:?}", claims.sub, claims.role);
        return Err(GateError::Unauthorized);
    }
    Ok(claims)
}

/// `Set-Cookie` value storing `token` for `max_age_secs`.
///
/// The cookie is HTTP-only, secure and `SameSite=None` so the static site on
/// another origin can send it with credentialed requests.
pub fn session_cookie_directive(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=None; Path=/; Max-Age={}",
        SESSION_COOKIE,
        urlencoding::encode(token),
        max_age_secs
    )
}

/// `Set-Cookie` value that expires the session cookie immediately.
pub fn clear_cookie_directive() -> String {
    format!("{}=; HttpOnly; Secure; SameSite=None; Path=/; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"gate-secret";
    const NOW: i64 = 1_700_000_000;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(COOKIE, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    fn token(role: &str, ttl: i64) -> String {
        let claims = SessionClaims::new("admin@example.com", role, "BugBox-Admin", NOW - 10, ttl);
        token_codec::sign(&claims, SECRET).unwrap()
    }

    #[test]
    fn test_cookie_extraction() {
        let h = headers(&["theme=dark; bb_auth=abc.def.ghi; other=1"]);
        assert_eq!(session_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_cookie_value_may_contain_separator() {
        let h = headers(&["bb_auth=a=b=c"]);
        assert_eq!(session_cookie(&h, SESSION_COOKIE).as_deref(), Some("a=b=c"));
    }

    #[test]
    fn test_cookie_is_percent_decoded_and_found_across_headers() {
        let h = headers(&["x=1", "bb_auth=a%2Eb%2Ec"]);
        assert_eq!(session_cookie(&h, SESSION_COOKIE).as_deref(), Some("a.b.c"));
    }

    #[test]
    fn test_missing_or_empty_cookie() {
        assert_eq!(session_cookie(&HeaderMap::new(), SESSION_COOKIE), None);
        assert_eq!(session_cookie(&headers(&["bb_auth="]), SESSION_COOKIE), None);
        assert_eq!(session_cookie(&headers(&["xbb_auth=1"]), SESSION_COOKIE), None);
    }

    #[test]
    fn test_authorize_admin() {
        let t = token("admin", 3600);
        let claims = authorize(Some(&t), SECRET, "admin", NOW).unwrap();
        assert_eq!(claims.sub, "admin@example.com");
    }

    #[test]
    fn test_authorize_rejects_everything_else() {
        assert_eq!(authorize(None, SECRET, "admin", NOW), Err(GateError::Unauthorized));

        let viewer = token("viewer", 3600);
        assert_eq!(authorize(Some(&viewer), SECRET, "admin", NOW), Err(GateError::Unauthorized));

        let expired = token("admin", 5);
        assert_eq!(authorize(Some(&expired), SECRET, "admin", NOW), Err(GateError::Unauthorized));

        let forged = token("admin", 3600);
        assert_eq!(
            authorize(Some(&forged), b"other-secret", "admin", NOW),
            Err(GateError::Unauthorized)
        );
    }

    #[test]
    fn test_cookie_directives() {
        let set = session_cookie_directive("a.b.c", 86_400);
        assert_eq!(
            set,
            "bb_auth=a.b.c; HttpOnly; Secure; SameSite=None; Path=/; Max-Age=86400"
        );
        assert!(clear_cookie_directive().ends_with("Max-Age=0"));
        assert!(clear_cookie_directive().starts_with("bb_auth=;"));
    }
}
