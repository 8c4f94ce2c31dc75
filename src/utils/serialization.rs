// src/utils/serialization.rs
//! Encoding helpers for documents sent to and received from the store.
//!
//! Provides:
//! - Indented JSON for human-readable diffs in the repository history
//! - Base64 transfer encoding used by the contents API

use serde::Serialize;

/// Serializes a value to 2-space indented JSON.
///
/// # Arguments
/// * `data` - The value to serialize (must implement `Serialize`)
///
/// # Returns
/// - `Ok(String)` with the indented JSON representation
/// - `Err(serde_json::Error)` if serialization fails
pub fn to_pretty_json<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

/// Encodes raw document bytes for transfer.
pub fn encode_content(bytes: &[u8]) -> String {
    base64::encode(bytes)
}

/// Decodes transferred document content.
///
/// The contents API wraps base64 payloads with line breaks, so all ASCII
/// whitespace is removed before decoding.
///
/// # Errors
/// Returns `base64::DecodeError` if the remaining text is not valid base64.
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::decode(compact)
}
