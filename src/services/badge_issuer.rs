// src/services/badge_issuer.rs
//! Badge issuance service.
//!
//! Turns an issue request from an authorized administrator into a complete
//! badge record (fresh identifier, timestamp, verification link, defaults)
//! and hands it to the registry update protocol.

use crate::models::badge::{BadgeRecord, IssuerInfo, Recipient};
use crate::services::registry::{RegistryError, RegistryUpdater};
use crate::settings::Settings;
use crate::utils::crypto::random_badge_id;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

/// Skills as sent by the admin page: a JSON array or a comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillList {
    List(Vec<String>),
    Text(String),
}

impl SkillList {
    /// Array entries are kept as given; text is split on commas, trimmed,
    /// and empty pieces dropped.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            SkillList::List(skills) => skills,
            SkillList::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(SkillList::List(items.iter().filter_map(scalar_text).collect())),
            other => scalar_text(other).map(SkillList::Text),
        }
    }
}

/// Body of `POST /api/issue`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueRequest {
    pub name: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_email: Option<String>,
    pub skills: Option<SkillList>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl IssueRequest {
    /// Parses a request body, treating anything unparsable as an empty request.
    ///
    /// Fields are read one by one, so a field of an unexpected type only
    /// loses that field. Numbers and booleans are taken as their text.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        let fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                log::warn!("Ignoring issue request body that is not an object: {}", other);
                return Self::default();
            }
            Err(e) => {
                log::warn!("Ignoring unparsable issue request body: {}", e);
                return Self::default();
            }
        };

        let text = |key: &str| fields.get(key).and_then(scalar_text);
        IssueRequest {
            name: text("name"),
            recipient_name: text("recipientName"),
            recipient_email: text("recipientEmail"),
            skills: fields.get("skills").and_then(SkillList::from_value),
            description: text("description"),
            image: text("image"),
        }
    }
}

/// Text of a JSON scalar; `null`, arrays and objects have none.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Failures of badge issuance.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("secure random source unavailable: {0}")]
    Random(#[from] rand::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Service composing badge records and recording them in the registry.
#[derive(Clone)]
pub struct BadgeIssuer {
    registry: RegistryUpdater,
    issuer: IssuerInfo,
    /// Verification links are `<site_base>#id=<id>`
    site_base: String,
    default_name: String,
    default_image: String,
}

impl BadgeIssuer {
    /// Creates an issuer using the organisation and defaults in `settings`.
    pub fn new(registry: RegistryUpdater, settings: &Settings) -> Self {
        BadgeIssuer {
            registry,
            issuer: IssuerInfo {
                name: settings.issuer_name.clone(),
                website: settings.issuer_website.clone(),
            },
            site_base: settings.site_base.clone(),
            default_name: settings.default_badge_name.clone(),
            default_image: settings.default_badge_image.clone(),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &RegistryUpdater {
        &self.registry
    }

    /// Builds the badge record for `request`.
    ///
    /// Empty strings count as missing, as the admin form submits blank
    /// inputs rather than omitting them.
    pub fn compose(&self, request: IssueRequest, id: String, issued_on: DateTime<Utc>) -> BadgeRecord {
        BadgeRecord {
            name: non_blank(request.name).unwrap_or_else(|| self.default_name.clone()),
            description: request.description.unwrap_or_default(),
            recipient: Recipient {
                name: request.recipient_name.unwrap_or_default(),
                email: non_blank(request.recipient_email),
            },
            issuer: self.issuer.clone(),
            issued_on: issued_on.to_rfc3339_opts(SecondsFormat::Millis, true),
            skills: request.skills.map(SkillList::into_vec).unwrap_or_default(),
            image: non_blank(request.image).unwrap_or_else(|| self.default_image.clone()),
            verify_url: format!("{}#id={}", self.site_base, id),
            id,
        }
    }

    /// Issues a new badge: fresh id, current time, registry upsert.
    ///
    /// # Returns
    /// The stored badge record.
    ///
    /// # Errors
    /// - `IssueError::Random` if no identifier could be generated
    /// - `IssueError::Registry` if the record or the registry could not be written
    pub async fn issue(&self, request: IssueRequest) -> Result<BadgeRecord, IssueError> {
        let id = random_badge_id()?;
        let badge = self.compose(request, id, Utc::now());
        self.registry.upsert_badge(&badge).await?;
        log::info!(
            "Issued badge {} to {:?}",
            badge.id,
            if badge.recipient.name.is_empty() { "Recipient" } else { badge.recipient.name.as_str() }
        );
        Ok(badge)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
