//! # Briefcast Common Library
//!
//! Shared code for the briefcast services:
//! - Progress event types (the websocket wire contract)
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod events;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use events::ProgressEvent;
