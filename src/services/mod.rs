// src/services/mod.rs
pub mod api_server;
pub mod authenticator;
pub mod badge_issuer;
pub mod registry;
