//! Shared types, errors, and configuration for Crashbay.
//!
//! This crate provides common types used across all other crates:
//! - `CrashId` for type-safe crash references
//! - The application-wide error taxonomy
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::AppError;
pub use types::CrashId;
