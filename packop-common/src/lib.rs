//! # Pack Opening Common Library
//!
//! Shared code for the pack reveal service:
//! - Error types
//! - TOML configuration loading and config file discovery
//! - Event types (RevealEvent enum) and the broadcast EventBus
//! - Time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{CueKind, EventBus, ResolutionStatus, RevealEvent, Stage};
