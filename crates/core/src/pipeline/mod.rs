//! Per-submission orchestration and admission control.

pub mod coordinator;
pub mod governor;

pub use coordinator::{Coordinator, IngestError, IngestOutcome, PersistedReport};
pub use governor::{Governor, GovernorError, Permit};
