//! # DAM Tagger Common Library
//!
//! Shared code for the DAM tagger crates including:
//! - Error types
//! - Configuration loading and resolution
//! - Event types (TaggingEvent enum) and the EventBus

pub mod config;
pub mod error;
pub mod events;

pub use config::{ConfigStore, Credentials, DamConfig};
pub use error::{Error, Result};
