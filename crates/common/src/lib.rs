//! Shared helpers used across the mylife crates: error context, crash-safe
//! file replacement, the API response envelope, and logging setup.

pub mod api;
pub mod error;
pub mod fs;
pub mod logging;

pub use {api::ApiResponse, error::FromMessage};
