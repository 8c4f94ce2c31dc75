// src/storage/mod.rs
pub mod document_store;
pub mod github_client;
pub mod memory_store;
