//! Built-in control messages
//!
//! ```text
//!  actor ──► manager : GetInterfaceRequest, PushInterfaceRequest, AddActorMessage,
//!                      RescheduleActorMessage, ShutdownActorMessage,
//!                      ShutdownInterfaceAcknowledgement, ShutdownSelfAcknowledgement,
//!                      ShutdownManagerMessage
//!  manager ──► actor : AddInterfaceMessage, ShutdownInterfaceMessage, ShutdownSelfRequest
//!  any ──► logging   : LogRequest
//! ```

use crate::actor::ManagedActor;
use crate::key::ActorKey;
use crate::mailbox::WriteOnlyMailbox;
use crate::message::Message;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt;

/// `source` wants the mailbox of `target` (a key or a wildcard pattern)
#[derive(Debug, Clone, Copy)]
pub struct GetInterfaceRequest {
    pub source: ActorKey,
    pub target: ActorKey,
}
impl Message for GetInterfaceRequest {}

/// `source` offers its own mailbox to `target` (a key or a wildcard pattern)
#[derive(Debug, Clone, Copy)]
pub struct PushInterfaceRequest {
    pub source: ActorKey,
    pub target: ActorKey,
}
impl Message for PushInterfaceRequest {}

/// Ask the manager to host a new actor
pub struct AddActorMessage {
    actor: Mutex<Option<Box<dyn ManagedActor>>>,
    /// Give the creator the new actor's mailbox
    pub return_interface: bool,
    /// Give the new actor the creator's mailbox
    pub forward_creator_interface: bool,
}

impl AddActorMessage {
    pub fn new(
        actor: Box<dyn ManagedActor>,
        return_interface: bool,
        forward_creator_interface: bool,
    ) -> Self {
        Self {
            actor: Mutex::new(Some(actor)),
            return_interface,
            forward_creator_interface,
        }
    }

    /// Move the actor out. Only the first call returns it.
    pub fn take_actor(&self) -> Option<Box<dyn ManagedActor>> {
        self.actor.lock().take()
    }
}

impl fmt::Debug for AddActorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.actor.lock().as_ref().map(|actor| actor.key());
        f.debug_struct("AddActorMessage")
            .field("actor", &key)
            .field("return_interface", &self.return_interface)
            .field("forward_creator_interface", &self.forward_creator_interface)
            .finish()
    }
}
impl Message for AddActorMessage {}

/// Run actor `key` at `time` in its own time domain
#[derive(Debug, Clone, Copy)]
pub struct RescheduleActorMessage {
    pub key: ActorKey,
    pub time: f64,
}
impl Message for RescheduleActorMessage {}

/// Begin the two-phase shutdown of `key`
#[derive(Debug, Clone, Copy)]
pub struct ShutdownActorMessage {
    pub key: ActorKey,
}
impl Message for ShutdownActorMessage {}

/// The sender has released its handle to `shutdown_key`
#[derive(Debug, Clone, Copy)]
pub struct ShutdownInterfaceAcknowledgement {
    pub shutdown_key: ActorKey,
}
impl Message for ShutdownInterfaceAcknowledgement {}

/// The sender has stopped and may be removed
#[derive(Debug, Clone, Copy)]
pub struct ShutdownSelfAcknowledgement;
impl Message for ShutdownSelfAcknowledgement {}

/// Hard-stop every actor and wind the manager down
#[derive(Debug, Clone, Copy)]
pub struct ShutdownManagerMessage;
impl Message for ShutdownManagerMessage {}

/// Grant of a write handle to `key`'s mailbox
#[derive(Debug, Clone)]
pub struct AddInterfaceMessage {
    pub key: ActorKey,
    pub mailbox: WriteOnlyMailbox,
}
impl Message for AddInterfaceMessage {}

/// `key` is shutting down: release any handle to it
#[derive(Debug, Clone, Copy)]
pub struct ShutdownInterfaceMessage {
    pub key: ActorKey,
}
impl Message for ShutdownInterfaceMessage {}

/// Stop servicing. Hard shutdown discards undelivered regular messages.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownSelfRequest {
    pub is_hard: bool,
}
impl Message for ShutdownSelfRequest {}

/// Free-text log line for the logging actor
#[derive(Debug, Clone)]
pub struct LogRequest {
    pub source: ActorKey,
    pub message: String,
    pub timestamp: DateTime<Local>,
    /// Sender's clock in its own time domain
    pub elapsed: f64,
}
impl Message for LogRequest {}
