// src/session/token_codec.rs
//! Signing and verification of compact admin session tokens.
//!
//! Tokens are HS256 JSON Web Tokens: `header.payload.signature`, each segment
//! base64url without padding, the signature being HMAC-SHA256 over
//! `header.payload`. Verification is stateless: any process holding the
//! secret can verify a token issued by any other.
//!
//! Signature checking is delegated to `jsonwebtoken`, which recomputes the
//! MAC and compares it in constant time. Time bounds are checked here
//! against an explicit `now` so expiry behaviour is deterministic under test.

use crate::models::claims::SessionClaims;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

/// Reasons a token cannot be signed or accepted.
///
/// The variants exist for logging only; the authorization boundary reports
/// every verification failure identically.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing secret is not configured")]
    MissingSecret,

    #[error("token is not three non-empty segments")]
    Malformed,

    #[error("token signature, header or payload rejected: {0}")]
    Rejected(String),

    #[error("token expired at {exp}")]
    Expired { exp: i64 },

    #[error("token not valid before {nbf}")]
    NotYetValid { nbf: i64 },
}

/// Signs `claims` with `secret`.
///
/// Deterministic for identical claims and secret.
///
/// # Errors
/// - `TokenError::MissingSecret` if `secret` is empty
/// - `TokenError::Rejected` if the claims cannot be encoded
pub fn sign(claims: &SessionClaims, secret: &[u8]) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret))
        .map_err(|e| TokenError::Rejected(e.to_string()))
}

/// Verifies `token` against `secret` at the current time.
pub fn verify(token: &str, secret: &[u8]) -> Result<SessionClaims, TokenError> {
    verify_at(token, secret, chrono::Utc::now().timestamp())
}

/// Verifies `token` against `secret` at Unix time `now`.
///
/// # Process Flow
/// 1. Require exactly three non-empty `.`-separated segments
/// 2. Recompute and compare the HS256 signature (constant time)
/// 3. Decode the payload as `SessionClaims`
/// 4. Reject when `now > exp` or `now < nbf`
pub fn verify_at(token: &str, secret: &[u8], now: i64) -> Result<SessionClaims, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::Malformed);
    }

    let claims = decode::<SessionClaims>(token, &DecodingKey::from_secret(secret), &validation())
        .map_err(|e| TokenError::Rejected(e.to_string()))?
        .claims;

    if claims.is_active_at(now) {
        return Ok(claims);
    }
    match (claims.exp, claims.nbf) {
        (Some(exp), _) if now > exp => Err(TokenError::Expired { exp }),
        (_, Some(nbf)) => Err(TokenError::NotYetValid { nbf }),
        _ => Err(TokenError::Malformed),
    }
}

// Signature and algorithm only; time bounds are checked by `verify_at`.
fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;
    validation
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-a";
    const NOW: i64 = 1_700_000_000;

    fn claims(exp_offset: i64) -> SessionClaims {
        SessionClaims {
            sub: "admin@example.com".into(),
            role: "admin".into(),
            iat: NOW - 60,
            nbf: Some(NOW - 60),
            exp: Some(NOW + exp_offset),
            iss: "BugBox-Admin".into(),
        }
    }

    #[test]
    fn test_round_trip() {
        let original = claims(3600);
        let token = sign(&original, SECRET).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(verify_at(&token, SECRET, NOW).unwrap(), original);
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign(&claims(10), SECRET).unwrap();
        let b = sign(&claims(10), SECRET).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_without_secret_fails() {
        assert_eq!(sign(&claims(10), b""), Err(TokenError::MissingSecret));
    }

    #[test]
    fn test_any_single_character_change_is_rejected() {
        let token = sign(&claims(3600), SECRET).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            if bytes[i] == b'.' {
                continue;
            }
            let mut tampered = bytes.to_vec();
            tampered[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(
                verify_at(&tampered, SECRET, NOW).is_err(),
                "tampered position {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_flipped_low_bit_in_each_segment_is_rejected() {
        let token = sign(&claims(3600), SECRET).unwrap();
        let mut offset = 0;
        for segment in token.split('.') {
            let mut tampered = token.clone().into_bytes();
            // middle of the segment, low bit flip keeps the character printable
            let pos = offset + segment.len() / 2;
            tampered[pos] ^= 0x01;
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(verify_at(&tampered, SECRET, NOW).is_err());
            offset += segment.len() + 1;
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let expired = sign(&claims(-1), SECRET).unwrap();
        assert_eq!(
            verify_at(&expired, SECRET, NOW),
            Err(TokenError::Expired { exp: NOW - 1 })
        );

        let live = sign(&claims(1), SECRET).unwrap();
        assert!(verify_at(&live, SECRET, NOW).is_ok());

        let edge = sign(&claims(0), SECRET).unwrap();
        assert!(verify_at(&edge, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_not_before_is_enforced() {
        let mut future = claims(3600);
        future.nbf = Some(NOW + 30);
        let token = sign(&future, SECRET).unwrap();
        assert_eq!(
            verify_at(&token, SECRET, NOW),
            Err(TokenError::NotYetValid { nbf: NOW + 30 })
        );
        assert!(verify_at(&token, SECRET, NOW + 30).is_ok());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = sign(&claims(3600), SECRET).unwrap();
        assert!(matches!(
            verify_at(&token, b"test-secret-b", NOW),
            Err(TokenError::Rejected(_))
        ));
    }

    #[test]
    fn test_structural_garbage_is_rejected() {
        for token in ["", "abc", "a.b", "a..c", ".b.c", "a.b.", "a.b.c.d", "a.b.c"] {
            assert!(verify_at(token, SECRET, NOW).is_err(), "{:?} accepted", token);
        }
        assert_eq!(verify_at("a.b", SECRET, NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn test_token_without_expiry_is_accepted() {
        let mut open = claims(0);
        open.exp = None;
        let token = sign(&open, SECRET).unwrap();
        assert_eq!(verify_at(&token, SECRET, i64::MAX).unwrap(), open);
    }
}
