//! Crash announcement over a publish/subscribe channel.
//!
//! Once a report is finalized, its id is published so downstream
//! processors learn about it. Delivery is at-least-once: consumers must
//! tolerate duplicate ids, and no component here attempts exactly-once
//! semantics.

pub mod announcer;
pub mod error;
pub mod transport;

pub use announcer::{Announcer, PublishRecord};
pub use error::PublishError;
pub use transport::{HttpPushTransport, NoopTransport, PublishTransport};
