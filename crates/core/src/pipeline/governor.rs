//! Concurrency governor: admission control for in-flight submissions.
//!
//! Load shedding happens before any expensive work: a submission is
//! admitted (or refused) before its body is decoded, and byte credit is
//! reserved incrementally as chunks arrive so one large upload cannot
//! blow past the ceiling between admission and decode. A [`Permit`]
//! releases its slot and bytes exactly once, on drop, whichever terminal
//! state the submission reaches.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crashbay_shared::AppError;
use thiserror::Error;

/// Admission refusals. Both map to a "server busy" outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GovernorError {
    /// The in-flight submission ceiling is reached.
    #[error("in-flight submission ceiling reached")]
    InFlightCeiling,

    /// The buffered-bytes ceiling is reached.
    #[error("buffered bytes ceiling reached")]
    BufferCeiling,
}

impl From<GovernorError> for AppError {
    fn from(err: GovernorError) -> Self {
        match err {
            GovernorError::InFlightCeiling => Self::Busy("in-flight submission ceiling reached"),
            GovernorError::BufferCeiling => Self::Busy("buffered bytes ceiling reached"),
        }
    }
}

/// Process-wide in-flight and buffered-byte accounting.
#[derive(Debug)]
pub struct Governor {
    max_in_flight: usize,
    max_buffered_bytes: u64,
    in_flight: AtomicUsize,
    buffered_bytes: AtomicU64,
}

impl Governor {
    /// Create a governor with the given ceilings.
    #[must_use]
    pub fn new(max_in_flight: usize, max_buffered_bytes: u64) -> Self {
        Self {
            max_in_flight,
            max_buffered_bytes,
            in_flight: AtomicUsize::new(0),
            buffered_bytes: AtomicU64::new(0),
        }
    }

    /// Try to admit one submission. Refusal costs nothing beyond the
    /// counter bump-and-rollback.
    pub fn try_admit(self: &Arc<Self>) -> Result<Permit, GovernorError> {
        let previous = self.in_flight.fetch_add(1, Ordering::AcqRel);
        if previous >= self.max_in_flight {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            return Err(GovernorError::InFlightCeiling);
        }
        Ok(Permit {
            governor: Arc::clone(self),
            bytes: 0,
        })
    }

    /// Current in-flight submission count.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Current buffered byte total.
    #[must_use]
    pub fn buffered_bytes(&self) -> u64 {
        self.buffered_bytes.load(Ordering::Acquire)
    }
}

/// One admitted submission's slot. Dropping it releases the slot and any
/// reserved bytes; ownership guarantees exactly one decrement per
/// submission, retries included.
#[derive(Debug)]
pub struct Permit {
    governor: Arc<Governor>,
    bytes: u64,
}

impl Permit {
    /// Reserve byte credit for a body chunk about to be buffered.
    ///
    /// # Errors
    ///
    /// Returns [`GovernorError::BufferCeiling`] when the reservation would
    /// exceed the process-wide ceiling; the reservation is rolled back.
    pub fn reserve_bytes(&mut self, len: u64) -> Result<(), GovernorError> {
        let previous = self.governor.buffered_bytes.fetch_add(len, Ordering::AcqRel);
        if previous.saturating_add(len) > self.governor.max_buffered_bytes {
            self.governor.buffered_bytes.fetch_sub(len, Ordering::AcqRel);
            return Err(GovernorError::BufferCeiling);
        }
        self.bytes += len;
        Ok(())
    }

    /// Bytes reserved by this permit so far.
    #[must_use]
    pub const fn reserved_bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.governor.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.governor
            .buffered_bytes
            .fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_ceiling() {
        let governor = Arc::new(Governor::new(2, 1024));
        let a = governor.try_admit().expect("first");
        let _b = governor.try_admit().expect("second");
        assert_eq!(
            governor.try_admit().unwrap_err(),
            GovernorError::InFlightCeiling
        );
        assert_eq!(governor.in_flight(), 2);

        drop(a);
        assert_eq!(governor.in_flight(), 1);
        let _c = governor.try_admit().expect("slot freed");
    }

    #[test]
    fn test_byte_ceiling_and_rollback() {
        let governor = Arc::new(Governor::new(4, 100));
        let mut permit = governor.try_admit().expect("admit");
        permit.reserve_bytes(60).expect("within ceiling");
        assert_eq!(
            permit.reserve_bytes(50).unwrap_err(),
            GovernorError::BufferCeiling
        );
        // Failed reservation must not leak credit.
        assert_eq!(governor.buffered_bytes(), 60);
        permit.reserve_bytes(40).expect("exactly at ceiling");
        assert_eq!(permit.reserved_bytes(), 100);

        drop(permit);
        assert_eq!(governor.buffered_bytes(), 0);
        assert_eq!(governor.in_flight(), 0);
    }

    #[test]
    fn test_counters_return_to_zero_under_concurrency() {
        let governor = Arc::new(Governor::new(8, 1 << 20));
        let mut handles = Vec::new();
        for _ in 0..32 {
            let governor = Arc::clone(&governor);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    if let Ok(mut permit) = governor.try_admit() {
                        let _ = permit.reserve_bytes(512);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread");
        }
        assert_eq!(governor.in_flight(), 0);
        assert_eq!(governor.buffered_bytes(), 0);
    }

    #[test]
    fn test_refusals_map_to_busy() {
        let in_flight: AppError = GovernorError::InFlightCeiling.into();
        let buffered: AppError = GovernorError::BufferCeiling.into();
        assert_eq!(in_flight.status_code(), 503);
        assert_eq!(buffered.status_code(), 503);
        assert_eq!(in_flight.reason_code(), "busy");
    }

    #[test]
    fn test_zero_ceiling_rejects_everything() {
        let governor = Arc::new(Governor::new(0, 0));
        assert!(governor.try_admit().is_err());
        assert_eq!(governor.in_flight(), 0);
    }
}
