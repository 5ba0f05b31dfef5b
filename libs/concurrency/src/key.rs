//! Actor Identity
//!
//! An [`ActorKey`] packs three components into a `u64`:
//!
//! ```text
//!  63            32 31        16 15         0
//! ┌────────────────┬────────────┬────────────┐
//! │    subject     │   major    │   minor    │
//! └────────────────┴────────────┴────────────┘
//! ```
//!
//! A component of `0` is a wildcard when the key is used as a pattern and
//! "allocate for me" when the key is handed to the manager on add. Only keys
//! with no zero component name a single live actor.

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical role of an actor
#[repr(u32)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, Serialize, Deserialize,
)]
pub enum Subject {
    /// Wildcard / unassigned
    All = 0,
    ConcurrencyManager = 1,
    Logging = 2,
    Logic = 3,
    NetworkConnectionManager = 4,
    NetworkConnectionSet = 5,
    Ai = 6,
    Ui = 7,
    Database = 8,
}

impl Subject {
    pub fn name(&self) -> &'static str {
        match self {
            Subject::All => "All",
            Subject::ConcurrencyManager => "ConcurrencyManager",
            Subject::Logging => "Logging",
            Subject::Logic => "Logic",
            Subject::NetworkConnectionManager => "NetworkConnectionManager",
            Subject::NetworkConnectionSet => "NetworkConnectionSet",
            Subject::Ai => "AI",
            Subject::Ui => "UI",
            Subject::Database => "Database",
        }
    }

    /// Subjects whose keys are fixed and never allocated
    pub fn is_reserved(&self) -> bool {
        matches!(self, Subject::ConcurrencyManager | Subject::Logging)
    }
}

/// Hierarchical actor identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorKey(u64);

/// The manager's own identity
pub const MANAGER_KEY: ActorKey = ActorKey::new(Subject::ConcurrencyManager, 1, 1);

/// The logging actor's identity
pub const LOGGING_KEY: ActorKey = ActorKey::new(Subject::Logging, 1, 1);

/// Pattern matching every actor except the reserved ones
pub const ALL_ACTORS: ActorKey = ActorKey::new(Subject::All, 0, 0);

/// Component value meaning "any" / "needs allocation"
pub const WILDCARD: u16 = 0;

impl ActorKey {
    pub const fn new(subject: Subject, major: u16, minor: u16) -> Self {
        Self(((subject as u64) << 32) | ((major as u64) << 16) | minor as u64)
    }

    /// Key for `subject` with both indices left to the allocator
    pub const fn for_subject(subject: Subject) -> Self {
        Self::new(subject, WILDCARD, WILDCARD)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Subject component, `None` for an unknown raw value
    pub fn subject(&self) -> Option<Subject> {
        Subject::try_from(self.subject_raw()).ok()
    }

    pub const fn subject_raw(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn major(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn minor(&self) -> u16 {
        self.0 as u16
    }

    pub fn with_major(&self, major: u16) -> Self {
        Self((self.0 & !0xFFFF_0000) | ((major as u64) << 16))
    }

    pub fn with_minor(&self, minor: u16) -> Self {
        Self((self.0 & !0xFFFF) | minor as u64)
    }

    /// True when no component is a wildcard
    pub fn is_unique(&self) -> bool {
        self.subject_raw() != 0 && self.major() != WILDCARD && self.minor() != WILDCARD
    }

    /// Subject is set but an index still has to be assigned
    pub fn needs_allocation(&self) -> bool {
        self.subject_raw() != 0 && (self.major() == WILDCARD || self.minor() == WILDCARD)
    }

    pub fn is_reserved(&self) -> bool {
        *self == MANAGER_KEY || *self == LOGGING_KEY
    }

    /// Pattern test: every non-wildcard component of `self` equals the
    /// corresponding component of `key`. Reserved keys never match.
    pub fn matches(&self, key: ActorKey) -> bool {
        if key.is_reserved() {
            return false;
        }

        (self.subject_raw() == 0 || self.subject_raw() == key.subject_raw())
            && (self.major() == WILDCARD || self.major() == key.major())
            && (self.minor() == WILDCARD || self.minor() == key.minor())
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subject() {
            Some(subject) => write!(f, "{}({}, {})", subject.name(), self.major(), self.minor()),
            None => write!(
                f,
                "Subject#{}({}, {})",
                self.subject_raw(),
                self.major(),
                self.minor()
            ),
        }
    }
}

impl fmt::Debug for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorKey({})", self)
    }
}
