//! Messages, Frames and Type-Keyed Dispatch
//!
//! A [`Message`] is any `Send + Sync + Debug + 'static` type that opts in
//! with `impl Message for T {}`. Messages are immutable once sent and
//! travel as [`SharedMessage`] (`Arc<dyn Message>`), so one message can sit
//! in several frames and be read by several handlers at the same time.
//!
//! A [`MessageFrame`] batches the messages one actor sends to one
//! destination; frames are the unit that goes through a mailbox.
//!
//! [`HandlerTable`] maps the concrete message type to a handler closure.
//! Delivering a type with no handler, or registering a type twice, is a
//! protocol violation.

use crate::key::ActorKey;
use crate::{fatal, fatal_assert};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-erasure helpers, implemented for every sendable type
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Value that can be sent between actors
pub trait Message: AsAny + fmt::Debug {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared, immutable message
pub type SharedMessage = Arc<dyn Message>;

/// Runtime type of the value behind a shared message
pub fn message_type_id(message: &SharedMessage) -> TypeId {
    (**message).as_any().type_id()
}

/// Borrow the concrete value behind a shared message
pub fn downcast_ref<M: Message>(message: &SharedMessage) -> Option<&M> {
    (**message).as_any().downcast_ref::<M>()
}

/// Ordered batch of messages from one source
#[derive(Debug, Clone)]
pub struct MessageFrame {
    source: ActorKey,
    messages: Vec<SharedMessage>,
}

impl MessageFrame {
    pub fn new(source: ActorKey) -> Self {
        Self {
            source,
            messages: Vec::new(),
        }
    }

    pub fn source(&self) -> ActorKey {
        self.source
    }

    pub fn push(&mut self, message: SharedMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[SharedMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<SharedMessage> {
        self.messages
    }
}

type Handler<C> = Box<dyn Fn(&mut C, ActorKey, SharedMessage) + Send + Sync>;

/// Message handlers of one receiver type `C`, keyed by message type
pub struct HandlerTable<C> {
    handlers: HashMap<TypeId, (&'static str, Handler<C>)>,
}

impl<C> HandlerTable<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for message type `M`
    pub fn register<M, F>(&mut self, handler: F)
    where
        M: Message,
        F: Fn(&mut C, ActorKey, Arc<M>) + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<M>();
        fatal_assert!(
            !self.handlers.contains_key(&TypeId::of::<M>()),
            "duplicate handler registration for {}",
            type_name
        );

        let erased: Handler<C> = Box::new(move |receiver, source, message| {
            match message.into_any().downcast::<M>() {
                Ok(typed) => handler(receiver, source, typed),
                Err(_) => fatal!("handler for {} received another type", type_name),
            }
        });
        self.handlers
            .insert(TypeId::of::<M>(), (type_name, erased));
    }

    pub fn is_registered<M: Message>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<M>())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route `message` to its handler
    pub fn dispatch(&self, receiver: &mut C, source: ActorKey, message: SharedMessage) {
        match self.handlers.get(&message_type_id(&message)) {
            Some((_, handler)) => handler(receiver, source, message),
            None => fatal!(
                "no handler registered for {} (from {})",
                message.type_name(),
                source
            ),
        }
    }
}

impl<C> Default for HandlerTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for HandlerTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        f.debug_struct("HandlerTable").field("handlers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Subject;

    #[derive(Debug)]
    struct Ping(u32);
    impl Message for Ping {}

    #[derive(Debug)]
    struct Pong;
    impl Message for Pong {}

    #[derive(Default)]
    struct Receiver {
        seen: Vec<(ActorKey, u32)>,
    }

    fn source() -> ActorKey {
        ActorKey::new(Subject::Logic, 1, 1)
    }

    #[test]
    fn test_frame_preserves_order() {
        let mut frame = MessageFrame::new(source());
        frame.push(Arc::new(Ping(1)));
        frame.push(Arc::new(Pong));
        frame.push(Arc::new(Ping(2)));

        assert_eq!(frame.len(), 3);
        let names: Vec<_> = frame.messages().iter().map(|m| m.type_name()).collect();
        assert!(names[0].ends_with("Ping"));
        assert!(names[1].ends_with("Pong"));
        assert!(names[2].ends_with("Ping"));
    }

    #[test]
    fn test_dispatch_by_concrete_type() {
        let mut table = HandlerTable::<Receiver>::new();
        table.register(|receiver: &mut Receiver, from, ping: Arc<Ping>| {
            receiver.seen.push((from, ping.0));
        });

        let mut receiver = Receiver::default();
        table.dispatch(&mut receiver, source(), Arc::new(Ping(42)));
        assert_eq!(receiver.seen, vec![(source(), 42)]);
        assert!(table.is_registered::<Ping>());
        assert!(!table.is_registered::<Pong>());
    }

    #[test]
    fn test_shared_message_reaches_two_receivers() {
        let mut table = HandlerTable::<Receiver>::new();
        table.register(|receiver: &mut Receiver, from, ping: Arc<Ping>| {
            receiver.seen.push((from, ping.0));
        });

        let message: SharedMessage = Arc::new(Ping(5));
        let (mut a, mut b) = (Receiver::default(), Receiver::default());
        table.dispatch(&mut a, source(), Arc::clone(&message));
        table.dispatch(&mut b, source(), message);
        assert_eq!(a.seen, b.seen);
    }

    #[test]
    #[should_panic(expected = "no handler registered")]
    fn test_unregistered_type_is_fatal() {
        let table = HandlerTable::<Receiver>::new();
        table.dispatch(&mut Receiver::default(), source(), Arc::new(Pong));
    }

    #[test]
    #[should_panic(expected = "duplicate handler registration")]
    fn test_duplicate_registration_is_fatal() {
        let mut table = HandlerTable::<Receiver>::new();
        table.register(|_: &mut Receiver, _, _: Arc<Pong>| {});
        table.register(|_: &mut Receiver, _, _: Arc<Pong>| {});
    }
}
