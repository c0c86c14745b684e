//! # secretsync-core
//!
//! Core configuration and utilities for secretsync.
//!
//! This crate provides shared functionality used across all secretsync crates:
//!
//! - **Configuration**: Loading, merging, and validation of the system config directory
//! - **Paths**: Resolution of service, secret, and credential locations on disk
//! - **Utilities**: Environment lookup and a zeroizing byte buffer for secret payloads

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

// Re-exports for convenience
pub use config::SystemConfig;
pub use error::{ConfigError, Result};
pub use secret::SecretBytes;
