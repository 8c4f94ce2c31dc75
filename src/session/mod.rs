// src/session/mod.rs
//! Stateless admin sessions: token codec and the authorization gate.

pub mod gate;
pub mod token_codec;
