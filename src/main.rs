// src/main.rs

//! # Badge Registry - Main Entry Point
//!
//! Serverless-style admin API for a static badge site. It initializes the
//! configured registry store and the services, then starts the API server.
//!
//! ## Architecture Overview
//! 1. **Session Layer**: HS256 session tokens carried in the `bb_auth` cookie
//! 2. **Services Layer**: Login, badge issuance and the registry update protocol
//! 3. **Storage Layer**: Versioned documents in a GitHub repository (or in memory)
//!
//! ## Environment Variables Required
//! - `AUTH_SECRET`: Session token signing key
//! - `ADMIN_PASS`: Shared administrator password
//! - `ADMIN_EMAILS`: Comma-separated administrator allow-list
//! - `GITHUB_TOKEN`: Registry repository token (when `STORE_BACKEND=github`)
//!
//! Missing secrets are reported at start-up; the routes needing them answer
//! with a configuration error until they are set.

use crate::models::badge::IssuerInfo;
use crate::services::api_server::ApiServer;
use crate::services::authenticator::Authenticator;
use crate::services::badge_issuer::BadgeIssuer;
use crate::services::registry::RegistryUpdater;
use crate::settings::Settings;
use crate::storage::document_store::DocumentStore;
use crate::storage::github_client::GitHubStore;
use crate::storage::memory_store::MemoryStore;
use anyhow::{bail, Context};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod error;      // HTTP error mapping
mod models;     // Data structures
mod services;   // Business logic and API
mod session;    // Token codec and authorization gate
mod settings;   // Environment configuration
mod storage;    // Versioned document stores
mod utils;      // Helper functions

/// Builds the registry store selected by `STORE_BACKEND`.
///
/// # Returns
/// `None` when the GitHub backend is selected but no token is configured;
/// issuance is then unavailable while login keeps working.
fn build_store(settings: &Settings) -> anyhow::Result<Option<Arc<dyn DocumentStore>>> {
    match settings.store_backend.as_str() {
        "github" => match settings.github_token() {
            Some(token) => {
                let store: Arc<dyn DocumentStore> = Arc::new(
                    GitHubStore::new(settings, token).context("Failed to build GitHub HTTP client")?,
                );
                log::info!(
                    "Registry store: github {}/{}@{}",
                    settings.github_owner,
                    settings.github_repo,
                    settings.github_branch
                );
                Ok(Some(store))
            }
            None => Ok(None),
        },
        "memory" => {
            log::warn!("Registry store: in-memory, issued badges are not persisted");
            let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
            Ok(Some(store))
        }
        other => bail!("Unknown STORE_BACKEND {:?} (expected \"github\" or \"memory\")", other),
    }
}

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment configuration
/// 2. Check the secure random source
/// 3. Initialize the registry store and service components
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Arc::new(Settings::load().context("Failed to load configuration")?);
    let missing = settings.missing_secrets();
    if !missing.is_empty() {
        log::warn!("Server not fully configured, missing: {}", missing.join(", "));
    }

    utils::crypto::ensure_secure_random().context("Secure random source unavailable")?;

    let badge_issuer = build_store(&settings)?.map(|store| {
        let registry = RegistryUpdater::new(
            store,
            &settings.registry_dir,
            IssuerInfo {
                name: settings.issuer_name.clone(),
                website: settings.issuer_website.clone(),
            },
            settings.max_registry_attempts,
        );
        BadgeIssuer::new(registry, &settings)
    });
    let authenticator = Authenticator::new(&settings);

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid BIND_ADDR {:?}", settings.bind_addr))?;

    log::info!("API server running at http://{}", addr);
    log::info!("Available endpoints:");
    log::info!("- POST /api/login");
    log::info!("- POST /api/logout");
    log::info!("- POST /api/issue");

    ApiServer::new(settings, authenticator, badge_issuer)
        .run(addr)
        .await
}
