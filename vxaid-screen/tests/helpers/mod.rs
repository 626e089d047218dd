//! Test Helper Utilities
//!
//! Shared utilities for testing vxaid-screen

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_backend;

pub use fixtures::{fundus_candidate, fundus_png, glaucoma_body};
pub use mock_backend::{unreachable_url, MockBackend, MockConfig, Respond, Upload};
