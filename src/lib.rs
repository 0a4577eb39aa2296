//! Forge - LLM code generation server
//!
//! Turns chat messages into generated web projects through a bounded
//! model/tool loop, keeping a semantic index of each project so later
//! turns retrieve the code they need.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod state;

pub use error::{Error, Result};
pub use state::AppState;
