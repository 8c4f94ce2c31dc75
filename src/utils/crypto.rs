// src/utils/crypto.rs
//! Cryptographic helpers shared by the login flow and badge issuance.
//!
//! - Constant-time byte comparison (via `ring`)
//! - Badge identifiers drawn from the operating system CSPRNG (via `rand::rngs::OsRng`)
//!
//! There is no fallback generator: if the OS source fails,
//! identifier generation fails.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::constant_time::verify_slices_are_equal;
use uuid::Uuid;

/// Compares two byte strings without early exit on the first differing byte.
///
/// Inputs of different length compare unequal immediately; only the length
/// is leaked in that case.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    verify_slices_are_equal(a, b).is_ok()
}

/// Generates a fresh badge identifier.
///
/// # Returns
/// A hyphenated, lower-case UUID v4 string built from 16 bytes of OS randomness.
///
/// # Errors
/// Returns `rand::Error` if the operating system random source is unavailable.
pub fn random_badge_id() -> Result<String, rand::Error> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes)?;
    // RFC 4122 version 4, variant 1
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Ok(Uuid::from_bytes(bytes).hyphenated().to_string())
}

/// Checks once at start-up that the secure random source works.
pub fn ensure_secure_random() -> Result<(), rand::Error> {
    let mut probe = [0u8; 16];
    OsRng.try_fill_bytes(&mut probe)
}
