//! Interface exchange bookkeeping
//!
//! Actors obtain each other's mailbox write handles through the manager:
//!
//! - **get** (`source` wants `target`'s mailbox)
//! - **push** (`source` gives its own mailbox to `target`)
//!
//! A request naming a unique key that is not live yet waits in the
//! *unfulfilled* list and is resolved the moment that key is added. A
//! request naming a wildcard pattern is resolved against every live match
//! immediately and then kept *persistently*, so each later actor matching
//! the pattern is served as well.

use crate::key::ActorKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Get,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceRequest {
    pub kind: RequestKind,
    pub source: ActorKey,
    pub target: ActorKey,
}

/// `recipient` is to be handed a write handle to `owner`'s mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceGrant {
    pub owner: ActorKey,
    pub recipient: ActorKey,
}

impl InterfaceRequest {
    pub fn get(source: ActorKey, target: ActorKey) -> Self {
        Self {
            kind: RequestKind::Get,
            source,
            target,
        }
    }

    pub fn push(source: ActorKey, target: ActorKey) -> Self {
        Self {
            kind: RequestKind::Push,
            source,
            target,
        }
    }

    /// Grant produced when the target resolves to `resolved`
    pub fn grant_for(&self, resolved: ActorKey) -> InterfaceGrant {
        match self.kind {
            RequestKind::Get => InterfaceGrant {
                owner: resolved,
                recipient: self.source,
            },
            RequestKind::Push => InterfaceGrant {
                owner: self.source,
                recipient: resolved,
            },
        }
    }

    fn references(&self, key: ActorKey) -> bool {
        self.source == key || self.target == key
    }
}

/// Outstanding get/push requests
#[derive(Debug, Default)]
pub struct InterfaceRequests {
    persistent: Vec<InterfaceRequest>,
    unfulfilled: Vec<InterfaceRequest>,
}

impl InterfaceRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_persistent(&mut self, request: InterfaceRequest) {
        if !self.persistent.contains(&request) {
            self.persistent.push(request);
        }
    }

    pub fn add_unfulfilled(&mut self, request: InterfaceRequest) {
        if !self.unfulfilled.contains(&request) {
            self.unfulfilled.push(request);
        }
    }

    /// Grants owed to actor `key` which was just added.
    ///
    /// `source_available` says whether a request's source may still take
    /// part (live and not shutting down). Resolved unfulfilled requests are
    /// consumed; persistent ones stay.
    pub fn resolve_new_actor(
        &mut self,
        key: ActorKey,
        source_available: impl Fn(ActorKey) -> bool,
    ) -> Vec<InterfaceGrant> {
        let mut grants: Vec<InterfaceGrant> = self
            .persistent
            .iter()
            .filter(|r| r.target.matches(key) && r.source != key && source_available(r.source))
            .map(|r| r.grant_for(key))
            .collect();

        self.unfulfilled.retain(|r| {
            if r.target != key || r.source == key {
                return true;
            }
            if source_available(r.source) {
                grants.push(r.grant_for(key));
            }
            false
        });

        grants
    }

    /// Drop every request naming `key` as source or target
    pub fn purge(&mut self, key: ActorKey) {
        self.persistent.retain(|r| !r.references(key));
        self.unfulfilled.retain(|r| !r.references(key));
    }

    pub fn persistent(&self) -> &[InterfaceRequest] {
        &self.persistent
    }

    pub fn unfulfilled(&self) -> &[InterfaceRequest] {
        &self.unfulfilled
    }
}
