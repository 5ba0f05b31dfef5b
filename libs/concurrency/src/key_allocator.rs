//! Identity allocation
//!
//! Fills in the wildcard components of a partially specified [`ActorKey`]
//! with the lowest free index and keeps track of which keys are live.

use crate::key::{ActorKey, WILDCARD};
use crate::{fatal, fatal_assert};
use std::collections::{BTreeSet, HashMap};

/// Tracks in-use major/minor indices per subject
#[derive(Debug, Default)]
pub struct KeyAllocator {
    majors: HashMap<u32, BTreeSet<u16>>,
    minors: HashMap<(u32, u16), BTreeSet<u16>>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `key` with every wildcard index replaced by the lowest unused
    /// one. A wildcard major always yields a fresh major.
    ///
    /// The key is not tracked until [`KeyAllocator::add_tracked`].
    pub fn fill_in(&self, key: ActorKey) -> ActorKey {
        fatal_assert!(
            key.subject_raw() != 0,
            "cannot allocate an identity without a subject: {}",
            key
        );
        if key.needs_allocation() && key.subject().is_some_and(|s| s.is_reserved()) {
            fatal!("reserved identity {} must be fully specified", key);
        }

        let subject = key.subject_raw();
        let mut key = key;

        if key.major() == WILDCARD {
            key = key.with_major(lowest_unused(self.majors.get(&subject)));
        }
        if key.minor() == WILDCARD {
            key = key.with_minor(lowest_unused(self.minors.get(&(subject, key.major()))));
        }
        key
    }

    /// Mark a unique key as live. A second live actor with the same key is a
    /// protocol violation.
    pub fn add_tracked(&mut self, key: ActorKey) {
        fatal_assert!(key.is_unique(), "cannot track non-unique identity {}", key);

        let subject = key.subject_raw();
        self.majors.entry(subject).or_default().insert(key.major());
        let inserted = self
            .minors
            .entry((subject, key.major()))
            .or_default()
            .insert(key.minor());
        fatal_assert!(inserted, "identity {} is already in use", key);
    }

    /// Release a key. The major index is released with its last minor.
    pub fn remove_tracked(&mut self, key: ActorKey) {
        let subject = key.subject_raw();
        let scope = (subject, key.major());

        let Some(minors) = self.minors.get_mut(&scope) else {
            return;
        };
        minors.remove(&key.minor());
        if !minors.is_empty() {
            return;
        }

        self.minors.remove(&scope);
        if let Some(majors) = self.majors.get_mut(&subject) {
            majors.remove(&key.major());
            if majors.is_empty() {
                self.majors.remove(&subject);
            }
        }
    }

    pub fn is_tracked(&self, key: ActorKey) -> bool {
        self.minors
            .get(&(key.subject_raw(), key.major()))
            .is_some_and(|minors| minors.contains(&key.minor()))
    }
}

/// Smallest positive index not present in `used`
fn lowest_unused(used: Option<&BTreeSet<u16>>) -> u16 {
    let mut candidate: u16 = 1;
    for &index in used.into_iter().flatten() {
        if index < candidate {
            continue;
        }
        if index > candidate {
            break;
        }
        candidate = match candidate.checked_add(1) {
            Some(next) => next,
            None => fatal!("identity index space exhausted"),
        };
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Subject, LOGGING_KEY};

    #[test]
    fn test_allocates_from_one() {
        let allocator = KeyAllocator::new();
        let key = allocator.fill_in(ActorKey::for_subject(Subject::Logic));
        assert_eq!(key, ActorKey::new(Subject::Logic, 1, 1));
    }

    #[test]
    fn test_fresh_major_per_wildcard_request() {
        let mut allocator = KeyAllocator::new();
        for expected in 1..=3 {
            let key = allocator.fill_in(ActorKey::for_subject(Subject::Ai));
            assert_eq!(key.major(), expected);
            assert_eq!(key.minor(), 1);
            allocator.add_tracked(key);
        }
    }

    #[test]
    fn test_minor_allocation_within_major() {
        let mut allocator = KeyAllocator::new();
        for expected in 1..=3 {
            let key = allocator.fill_in(ActorKey::new(Subject::Database, 4, 0));
            assert_eq!(key, ActorKey::new(Subject::Database, 4, expected));
            allocator.add_tracked(key);
        }
    }

    #[test]
    fn test_reuses_lowest_gap() {
        let mut allocator = KeyAllocator::new();
        for minor in 1..=4 {
            allocator.add_tracked(ActorKey::new(Subject::Ui, 1, minor));
        }
        allocator.remove_tracked(ActorKey::new(Subject::Ui, 1, 2));

        let key = allocator.fill_in(ActorKey::new(Subject::Ui, 1, 0));
        assert_eq!(key.minor(), 2);
    }

    #[test]
    fn test_major_released_with_last_minor() {
        let mut allocator = KeyAllocator::new();
        let a = ActorKey::new(Subject::Logic, 1, 1);
        let b = ActorKey::new(Subject::Logic, 1, 2);
        allocator.add_tracked(a);
        allocator.add_tracked(b);

        allocator.remove_tracked(a);
        assert_eq!(allocator.fill_in(ActorKey::for_subject(Subject::Logic)).major(), 2);

        allocator.remove_tracked(b);
        assert_eq!(allocator.fill_in(ActorKey::for_subject(Subject::Logic)).major(), 1);
        assert!(!allocator.is_tracked(b));
    }

    #[test]
    fn test_fully_specified_key_unchanged() {
        let allocator = KeyAllocator::new();
        let key = ActorKey::new(Subject::Ai, 7, 9);
        assert_eq!(allocator.fill_in(key), key);
        assert_eq!(allocator.fill_in(LOGGING_KEY), LOGGING_KEY);
    }

    #[test]
    #[should_panic(expected = "already in use")]
    fn test_duplicate_tracking_is_fatal() {
        let mut allocator = KeyAllocator::new();
        allocator.add_tracked(ActorKey::new(Subject::Ai, 1, 1));
        allocator.add_tracked(ActorKey::new(Subject::Ai, 1, 1));
    }

    #[test]
    #[should_panic(expected = "must be fully specified")]
    fn test_reserved_subject_allocation_is_fatal() {
        KeyAllocator::new().fill_in(ActorKey::for_subject(Subject::Logging));
    }

    #[test]
    #[should_panic(expected = "without a subject")]
    fn test_missing_subject_is_fatal() {
        KeyAllocator::new().fill_in(ActorKey::from_raw(0));
    }
}
