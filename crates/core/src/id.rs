//! Crash identifier assignment.
//!
//! Identifiers are UUID v4: 122 bits of randomness from the process CSPRNG,
//! never derived from request content, so a client cannot predict or force
//! a collision. Assignment is a pure function of the random source: no
//! I/O, cannot fail.
//!
//! The legacy collector spliced the submission date into the identifier's
//! trailing characters; here the date partition lives in the storage key
//! instead so the identifier keeps its full entropy.

use crashbay_shared::CrashId;

/// Assigns a fresh, globally unique crash identifier.
#[must_use]
pub fn new_crash_id() -> CrashId {
    CrashId::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_assignment_is_unique() {
        let ids: HashSet<_> = (0..10_000).map(|_| new_crash_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    proptest! {
        // The identifier never depends on anything a client sends; whatever
        // the submission looked like, the id is well-formed and URL-safe.
        #[test]
        fn prop_id_is_url_safe(_junk in ".*") {
            let id = new_crash_id().to_string();
            prop_assert_eq!(id.len(), 36);
            prop_assert!(id.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
        }
    }
}
