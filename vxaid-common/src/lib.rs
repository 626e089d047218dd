//! # VisionXaid Common Library
//!
//! Shared code for the VisionXaid screening client including:
//! - Error type and result alias
//! - Bootstrap configuration loading (CLI → ENV → TOML → default)
//! - Screening events and the event bus
//! - Display formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod format;

pub use error::{Error, Result};
pub use format::format_percent;
