//! Common types used across the application.

pub mod crash_id;

pub use crash_id::CrashId;
