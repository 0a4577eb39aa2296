//! Data models for Forge.
//!
//! Defines the types shared between the server and the library crates:
//! generation pipelines, code fragments, chat history rows and the
//! stream events produced during a generation turn.
//!
//! This crate can be used with or without sqlx support:
//! - Default: No database dependencies, pure data structures
//! - With `sqlx` feature: Adds `FromRow` derive for database mapping

mod chat;
mod codegen;
mod event;
mod fragment;

pub use chat::*;
pub use codegen::*;
pub use event::*;
pub use fragment::*;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Hex-encoded SHA-256 of the given content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
