// src/models/badge.rs
//! Badge record and registry document data model.
//!
//! Both structures are persisted as indented JSON in the registry repository,
//! so the serialized field names (`issuedOn`, `verifyUrl`, ...) are part of
//! the public format read by the static verification site.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Issuing organisation shown on every badge and at the top of the registry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct IssuerInfo {
    pub name: String,
    pub website: String,
}

/// Person a badge was issued to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,

    /// Omitted from the stored JSON when unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A single issued badge.
///
/// # Fields
/// - `id`: Server-generated 128-bit random identifier (hyphenated UUID text)
/// - `issued_on`: RFC 3339 UTC timestamp with millisecond precision
/// - `skills`: Ordered skill tags
/// - `image`: Relative or absolute image reference
/// - `verify_url`: Public link resolving the badge by id
///
/// Re-issuing with an existing `id` replaces the stored record wholesale.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub recipient: Recipient,
    pub issuer: IssuerInfo,
    pub issued_on: String,
    pub skills: Vec<String>,
    pub image: String,
    pub verify_url: String,
}

/// The shared registry document.
///
/// Entries are kept as raw JSON objects so fields written by other tools (or
/// older versions of this service) survive a read-modify-write cycle. Only
/// the `id` of each entry is ever inspected.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryDocument {
    pub issuer: IssuerInfo,

    /// Most recently issued first; ids are unique
    pub badges: Vec<Value>,

    /// Unknown top-level fields, written back untouched
    pub extra: Map<String, Value>,
}

impl RegistryDocument {
    /// Creates an empty registry for `issuer`.
    pub fn empty(issuer: IssuerInfo) -> Self {
        RegistryDocument {
            issuer,
            badges: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Decodes stored registry bytes.
    ///
    /// Never fails: content that is not a JSON object yields an empty
    /// registry, a malformed `issuer` falls back to `default_issuer`, and a
    /// `badges` value that is not an array becomes an empty sequence.
    /// The second element reports whether any such recovery happened.
    pub fn decode_lenient(bytes: &[u8], default_issuer: &IssuerInfo) -> (Self, bool) {
        let mut fields = match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(fields)) => fields,
            _ => return (Self::empty(default_issuer.clone()), true),
        };

        let mut recovered = false;
        let issuer = match fields.remove("issuer").map(serde_json::from_value::<IssuerInfo>) {
            Some(Ok(issuer)) => issuer,
            Some(Err(_)) => {
                recovered = true;
                default_issuer.clone()
            }
            None => default_issuer.clone(),
        };
        let badges = match fields.remove("badges") {
            Some(Value::Array(badges)) => badges,
            _ => {
                recovered = true;
                Vec::new()
            }
        };

        (
            RegistryDocument {
                issuer,
                badges,
                extra: fields,
            },
            recovered,
        )
    }

    /// Inserts `badge` at the front, dropping any entry with the same id.
    pub fn upsert(&mut self, badge: &BadgeRecord) -> Result<(), serde_json::Error> {
        let entry = serde_json::to_value(badge)?;
        self.badges.retain(|b| entry_id(b) != Some(badge.id.as_str()));
        self.badges.insert(0, entry);
        Ok(())
    }

    /// Ids of all entries, in registry order.
    pub fn ids(&self) -> Vec<&str> {
        self.badges.iter().filter_map(entry_id).collect()
    }

    /// Builds the JSON value that is persisted for this document.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut fields = Map::new();
        fields.insert("issuer".into(), serde_json::to_value(&self.issuer)?);
        fields.insert("badges".into(), Value::Array(self.badges.clone()));
        for (key, value) in &self.extra {
            fields.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(fields))
    }
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}
