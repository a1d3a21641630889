//! Core ingestion pipeline for Crashbay.
//!
//! Everything between "the payload has been decoded" and "the crash is
//! durable and announced" lives here:
//! - `report` - the crash report unit of work and its state machine
//! - `id` - crash identifier assignment
//! - `storage` - two-phase (stage-then-finalize) object store adapter
//! - `publish` - the announcer with retry/backoff and dead-letter records
//! - `pipeline` - the per-submission coordinator and the admission governor
//!
//! This crate has no web dependencies; the HTTP layer sits in
//! `crashbay-api`.

pub mod id;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod storage;
