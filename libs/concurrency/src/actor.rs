//! Actor Base (virtual process)
//!
//! An actor is a plain struct implementing [`Actor`] that embeds an
//! [`ActorCore`]. [`VirtualProcess`] wraps it with a message handler table
//! and exposes it to the manager through the object-safe [`ManagedActor`]
//! trait.
//!
//! # Service cycle
//!
//! ```text
//! service(now)
//!   ├─ first call: latch start time, Initializing ──► Running
//!   ├─ shutting down? ──► return
//!   ├─ drain own mailbox, dispatch each message by type
//!   ├─ run private task scheduler up to `now`
//!   ├─ Actor::on_service(now)
//!   ├─ still Running: ask manager to reschedule at
//!   │     min(now + reschedule_interval, next private task)
//!   ├─ flush regular frames ─► release shut-down interfaces ─► flush again
//!   └─ shutting down: nothing may remain queued, drop all write handles
//! flush_system_messages()      (always last, called by the executor)
//! ```
//!
//! # Outbound buffering
//!
//! Messages for the manager and for the logging actor go into two dedicated
//! frames that are only pushed by [`ManagedActor::flush_system_messages`],
//! after `service` has returned. A reschedule request can therefore never
//! cause the manager to re-enter this actor while its service call is still
//! running. Every other destination gets one growing frame that is
//! delivered once a write handle for it is held.
//!
//! # States
//!
//! `Initializing → Running → ShuttingDownSoft | ShuttingDownHard`. Soft
//! shutdown still delivers frames to held destinations on the way out; hard
//! shutdown only talks to the manager and the logging actor.

use crate::clock::TimeDomain;
use crate::executor::ExecutionContext;
use crate::key::{ActorKey, LOGGING_KEY, MANAGER_KEY};
use crate::mailbox::{ReadOnlyMailbox, WriteOnlyMailbox};
use crate::message::{HandlerTable, Message, MessageFrame, SharedMessage};
use crate::messages::{
    AddActorMessage, AddInterfaceMessage, GetInterfaceRequest, LogRequest, PushInterfaceRequest,
    RescheduleActorMessage, ShutdownActorMessage, ShutdownInterfaceAcknowledgement,
    ShutdownInterfaceMessage, ShutdownManagerMessage, ShutdownSelfAcknowledgement,
    ShutdownSelfRequest,
};
use crate::task_scheduler::TaskScheduler;
use crate::fatal_assert;
use chrono::Local;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Default seconds between self-reschedules
pub const DEFAULT_RESCHEDULE_INTERVAL: f64 = 0.1;

/// Lifecycle of an actor from its own point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Initializing,
    Running,
    ShuttingDownSoft,
    ShuttingDownHard,
}

impl ActorState {
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, ActorState::ShuttingDownSoft | ActorState::ShuttingDownHard)
    }
}

/// State shared by every actor: identity, private scheduler, outbound
/// buffers and held mailbox handles
pub struct ActorCore {
    key: ActorKey,
    state: ActorState,
    first_service_time: Option<f64>,
    current_time: f64,
    scheduler: TaskScheduler,

    pending_frames: BTreeMap<ActorKey, MessageFrame>,
    manager_frame: Option<MessageFrame>,
    logging_frame: Option<MessageFrame>,

    interfaces: BTreeMap<ActorKey, WriteOnlyMailbox>,
    manager_mailbox: Option<WriteOnlyMailbox>,
    logging_mailbox: Option<WriteOnlyMailbox>,
    own_mailbox: Option<ReadOnlyMailbox>,
    released_interfaces: BTreeSet<ActorKey>,
}

impl ActorCore {
    /// Core for an actor requesting `key`. Wildcard components are filled
    /// in by the manager when the actor is added.
    pub fn new(key: ActorKey) -> Self {
        Self::with_scheduler(key, TaskScheduler::new())
    }

    pub fn with_scheduler(key: ActorKey, scheduler: TaskScheduler) -> Self {
        Self {
            key,
            state: ActorState::Initializing,
            first_service_time: None,
            current_time: 0.0,
            scheduler,
            pending_frames: BTreeMap::new(),
            manager_frame: None,
            logging_frame: None,
            interfaces: BTreeMap::new(),
            manager_mailbox: None,
            logging_mailbox: None,
            own_mailbox: None,
            released_interfaces: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> ActorKey {
        self.key
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ActorState::Running
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.is_shutting_down()
    }

    /// `now` of the current or most recent service call
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Seconds since the first service call
    pub fn elapsed_time(&self) -> f64 {
        self.first_service_time
            .map(|start| self.current_time - start)
            .unwrap_or(0.0)
    }

    pub fn task_scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn task_scheduler_mut(&mut self) -> &mut TaskScheduler {
        &mut self.scheduler
    }

    /// Whether a write handle to `key` is held
    pub fn has_interface(&self, key: ActorKey) -> bool {
        match key {
            MANAGER_KEY => self.manager_mailbox.is_some(),
            LOGGING_KEY => self.logging_mailbox.is_some(),
            _ => self.interfaces.contains_key(&key),
        }
    }

    /// Keys of held regular write handles
    pub fn interfaces(&self) -> Vec<ActorKey> {
        self.interfaces.keys().copied().collect()
    }

    /// Messages buffered for regular destinations
    pub fn pending_message_count(&self) -> usize {
        self.pending_frames.values().map(MessageFrame::len).sum()
    }

    pub fn send<M: Message>(&mut self, destination: ActorKey, message: M) {
        self.send_shared(destination, Arc::new(message));
    }

    /// Buffer a message for `destination`
    pub fn send_shared(&mut self, destination: ActorKey, message: SharedMessage) {
        fatal_assert!(
            destination.is_unique(),
            "{} cannot send to non-unique key {}",
            self.key,
            destination
        );

        let source = self.key;
        let frame = match destination {
            MANAGER_KEY => self
                .manager_frame
                .get_or_insert_with(|| MessageFrame::new(source)),
            LOGGING_KEY => self
                .logging_frame
                .get_or_insert_with(|| MessageFrame::new(source)),
            _ => self
                .pending_frames
                .entry(destination)
                .or_insert_with(|| MessageFrame::new(source)),
        };
        frame.push(message);
    }

    /// Send a line to the logging actor
    pub fn log(&mut self, message: impl Into<String>) {
        let request = LogRequest {
            source: self.key,
            message: message.into(),
            timestamp: Local::now(),
            elapsed: self.current_time,
        };
        self.send(LOGGING_KEY, request);
    }

    /// Ask for a write handle to `target` (a key or a pattern)
    pub fn request_interface(&mut self, target: ActorKey) {
        let source = self.key;
        self.send(MANAGER_KEY, GetInterfaceRequest { source, target });
    }

    /// Offer this actor's mailbox to `target` (a key or a pattern)
    pub fn push_interface(&mut self, target: ActorKey) {
        let source = self.key;
        self.send(MANAGER_KEY, PushInterfaceRequest { source, target });
    }

    /// Have the manager host `actor`
    pub fn spawn_actor(
        &mut self,
        actor: Box<dyn ManagedActor>,
        return_interface: bool,
        forward_creator_interface: bool,
    ) {
        self.send(
            MANAGER_KEY,
            AddActorMessage::new(actor, return_interface, forward_creator_interface),
        );
    }

    /// Ask the manager to run `key` at `time`
    pub fn request_reschedule(&mut self, key: ActorKey, time: f64) {
        self.send(MANAGER_KEY, RescheduleActorMessage { key, time });
    }

    /// Start the two-phase shutdown of `key`
    pub fn request_shutdown(&mut self, key: ActorKey) {
        self.send(MANAGER_KEY, ShutdownActorMessage { key });
    }

    pub fn request_manager_shutdown(&mut self) {
        self.send(MANAGER_KEY, ShutdownManagerMessage);
    }

    /// Stop without a manager request. Nothing is acknowledged.
    pub(crate) fn stop_unsolicited(&mut self) {
        if self.is_shutting_down() {
            return;
        }
        warn!(actor = %self.key, "Unsolicited shutdown");
        self.state = ActorState::ShuttingDownHard;
        self.pending_frames.clear();
        self.interfaces.clear();
    }

    fn begin_service(&mut self, now: f64) {
        if self.state == ActorState::Initializing {
            self.first_service_time = Some(now);
            self.state = ActorState::Running;
            debug!(actor = %self.key, now, "Actor running");
        }
        self.current_time = now;
    }

    fn drain_inbox(&self) -> Vec<MessageFrame> {
        self.own_mailbox
            .as_ref()
            .map(ReadOnlyMailbox::remove_frames)
            .unwrap_or_default()
    }

    fn request_self_reschedule(&mut self, now: f64, interval: f64) {
        let time = (now + interval).min(self.scheduler.next_task_time());
        fatal_assert!(
            time > now,
            "{} would reschedule at {} which is not after {}",
            self.key,
            time,
            now
        );
        self.request_reschedule(self.key, time);
    }

    fn flush_regular_messages(&mut self) {
        if self.pending_frames.is_empty() {
            return;
        }

        if self.state == ActorState::ShuttingDownHard {
            let dropped = self.pending_message_count();
            self.pending_frames.clear();
            warn!(actor = %self.key, dropped, "Discarding undelivered messages on hard shutdown");
            return;
        }

        let interfaces = &self.interfaces;
        self.pending_frames.retain(|destination, frame| {
            let Some(mailbox) = interfaces.get(destination) else {
                return true;
            };
            let source = frame.source();
            let frame = std::mem::replace(frame, MessageFrame::new(source));
            if !mailbox.add_frame(frame) {
                trace!(destination = %destination, "Destination mailbox gone, frame dropped");
            }
            false
        });

        if self.state == ActorState::ShuttingDownSoft && !self.pending_frames.is_empty() {
            let dropped = self.pending_message_count();
            self.pending_frames.clear();
            warn!(actor = %self.key, dropped, "Discarding messages for destinations never granted");
        }
    }

    fn release_interfaces(&mut self) {
        for key in std::mem::take(&mut self.released_interfaces) {
            if self.interfaces.remove(&key).is_none() {
                self.pending_frames.remove(&key);
            } else {
                fatal_assert!(
                    !self.pending_frames.contains_key(&key),
                    "{} still has messages queued for released {}",
                    self.key,
                    key
                );
            }
            trace!(actor = %self.key, released = %key, "Interface released");
            self.send(MANAGER_KEY, ShutdownInterfaceAcknowledgement { shutdown_key: key });
        }
    }

    fn finish_shutdown(&mut self) {
        fatal_assert!(
            self.pending_frames.is_empty(),
            "{} is shutting down with {} messages queued",
            self.key,
            self.pending_message_count()
        );
        self.interfaces.clear();
    }

    fn flush_system_messages(&mut self) {
        let shutting_down = self.is_shutting_down();

        if let Some(mailbox) = &self.logging_mailbox {
            if let Some(frame) = self.logging_frame.take() {
                mailbox.add_frame(frame);
            }
        }
        if shutting_down {
            self.logging_mailbox = None;
        }

        if let Some(mailbox) = &self.manager_mailbox {
            if let Some(frame) = self.manager_frame.take() {
                mailbox.add_frame(frame);
            }
        }
        if shutting_down {
            self.manager_mailbox = None;
        }
    }

    fn handle_add_interface(&mut self, message: &AddInterfaceMessage) {
        match message.key {
            LOGGING_KEY => self.logging_mailbox = Some(message.mailbox.clone()),
            MANAGER_KEY => self.manager_mailbox = Some(message.mailbox.clone()),
            key => {
                if self.interfaces.contains_key(&key) {
                    trace!(actor = %self.key, interface = %key, "Duplicate interface grant ignored");
                } else {
                    debug!(actor = %self.key, interface = %key, "Interface added");
                    self.interfaces.insert(key, message.mailbox.clone());
                }
            }
        }
    }

    fn handle_shutdown_interface(&mut self, source: ActorKey, message: &ShutdownInterfaceMessage) {
        fatal_assert!(
            source == MANAGER_KEY,
            "interface shutdown notice from {} instead of the manager",
            source
        );
        fatal_assert!(
            !message.key.is_reserved(),
            "interface shutdown notice for reserved {}",
            message.key
        );
        self.released_interfaces.insert(message.key);
    }

    fn handle_shutdown_request(&mut self, source: ActorKey, message: &ShutdownSelfRequest) {
        fatal_assert!(
            source == MANAGER_KEY,
            "shutdown request from {} instead of the manager",
            source
        );
        fatal_assert!(
            !self.is_shutting_down(),
            "{} received a second shutdown request",
            self.key
        );

        self.state = if message.is_hard {
            ActorState::ShuttingDownHard
        } else {
            ActorState::ShuttingDownSoft
        };
        info!(actor = %self.key, hard = message.is_hard, "Actor shutting down");
        self.send(MANAGER_KEY, ShutdownSelfAcknowledgement);
    }
}

impl fmt::Debug for ActorCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorCore")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("interfaces", &self.interfaces.len())
            .field("pending_messages", &self.pending_message_count())
            .finish()
    }
}

/// Behaviour of a hosted actor
///
/// Only `core` / `core_mut` are required. Handlers for custom message types
/// are added in `register_handlers`; the base protocol messages are already
/// registered and must not be registered again.
pub trait Actor: Send + 'static {
    fn core(&self) -> &ActorCore;

    fn core_mut(&mut self) -> &mut ActorCore;

    fn register_handlers(_handlers: &mut HandlerTable<Self>)
    where
        Self: Sized,
    {
    }

    fn time_domain(&self) -> TimeDomain {
        TimeDomain::Logical
    }

    /// Root actors are scheduled as soon as they are added. Others wait
    /// for a [`RescheduleActorMessage`] naming them.
    fn is_root(&self) -> bool {
        true
    }

    fn reschedule_interval(&self) -> f64 {
        DEFAULT_RESCHEDULE_INTERVAL
    }

    /// Called once the final key is known
    fn on_initialize(&mut self) {}

    /// Called every service while Running, after messages and tasks.
    /// Private tasks it schedules at or before `now` run before the
    /// service call returns.
    fn on_service(&mut self, _now: f64) {}

    /// Called for every interface grant, including duplicates
    fn on_interface_added(&mut self, _key: ActorKey) {}

    /// Called after a shutdown request has been accepted
    fn on_shutdown(&mut self, _is_hard: bool) {}

    /// Called when `service` runs without an execution context
    fn on_detached_service(&mut self) {}

    fn log(&mut self, message: String) {
        self.core_mut().log(message);
    }
}

/// Host-facing contract of an actor
pub trait ManagedActor: Send {
    fn key(&self) -> ActorKey;

    fn state(&self) -> ActorState;

    fn time_domain(&self) -> TimeDomain;

    fn is_root(&self) -> bool;

    /// Adopt the final key and register message handlers
    fn initialize(&mut self, key: ActorKey);

    fn set_manager_mailbox(&mut self, mailbox: WriteOnlyMailbox);

    fn set_logging_mailbox(&mut self, mailbox: WriteOnlyMailbox);

    fn set_own_mailbox(&mut self, mailbox: ReadOnlyMailbox);

    fn service(&mut self, now: f64, context: Option<&ExecutionContext>);

    /// Must be the last call after `service` returns
    fn flush_system_messages(&mut self);

    fn log(&mut self, message: String);

    fn task_scheduler(&mut self) -> &mut TaskScheduler;

    /// Keys of held regular write handles
    fn interfaces(&self) -> Vec<ActorKey>;
}

/// An [`Actor`] plus its handler table
pub struct VirtualProcess<A: Actor> {
    actor: A,
    handlers: HandlerTable<A>,
}

impl<A: Actor> VirtualProcess<A> {
    pub fn new(actor: A) -> Self {
        Self {
            actor,
            handlers: HandlerTable::new(),
        }
    }

    pub fn boxed(actor: A) -> Box<dyn ManagedActor> {
        Box::new(Self::new(actor))
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    pub fn actor_mut(&mut self) -> &mut A {
        &mut self.actor
    }

    fn default_handlers() -> HandlerTable<A> {
        let mut handlers = HandlerTable::new();
        handlers.register(|actor: &mut A, _, message: Arc<AddInterfaceMessage>| {
            actor.core_mut().handle_add_interface(&message);
            actor.on_interface_added(message.key);
        });
        handlers.register(|actor: &mut A, source, message: Arc<ShutdownInterfaceMessage>| {
            actor.core_mut().handle_shutdown_interface(source, &message);
        });
        handlers.register(|actor: &mut A, source, message: Arc<ShutdownSelfRequest>| {
            actor.core_mut().handle_shutdown_request(source, &message);
            actor.on_shutdown(message.is_hard);
        });
        handlers
    }
}

impl<A: Actor> ManagedActor for VirtualProcess<A> {
    fn key(&self) -> ActorKey {
        self.actor.core().key()
    }

    fn state(&self) -> ActorState {
        self.actor.core().state()
    }

    fn time_domain(&self) -> TimeDomain {
        self.actor.time_domain()
    }

    fn is_root(&self) -> bool {
        self.actor.is_root()
    }

    fn initialize(&mut self, key: ActorKey) {
        fatal_assert!(key.is_unique(), "actor initialized with non-unique {}", key);
        self.actor.core_mut().key = key;

        let mut handlers = Self::default_handlers();
        A::register_handlers(&mut handlers);
        self.handlers = handlers;

        self.actor.on_initialize();
    }

    fn set_manager_mailbox(&mut self, mailbox: WriteOnlyMailbox) {
        self.actor.core_mut().manager_mailbox = Some(mailbox);
    }

    fn set_logging_mailbox(&mut self, mailbox: WriteOnlyMailbox) {
        self.actor.core_mut().logging_mailbox = Some(mailbox);
    }

    fn set_own_mailbox(&mut self, mailbox: ReadOnlyMailbox) {
        self.actor.core_mut().own_mailbox = Some(mailbox);
    }

    fn service(&mut self, now: f64, context: Option<&ExecutionContext>) {
        if context.is_none() {
            self.actor.on_detached_service();
        }

        self.actor.core_mut().begin_service(now);
        if self.actor.core().is_shutting_down() {
            return;
        }

        let frames = self.actor.core().drain_inbox();
        for frame in frames {
            let source = frame.source();
            for message in frame.into_messages() {
                self.handlers.dispatch(&mut self.actor, source, message);
            }
        }

        self.actor.core_mut().scheduler.service(now);

        if self.actor.core().is_running() {
            self.actor.on_service(now);
            // Tasks scheduled by on_service that are already due
            self.actor.core_mut().scheduler.service(now);
        }
        if self.actor.core().is_running() {
            let interval = self.actor.reschedule_interval();
            self.actor.core_mut().request_self_reschedule(now, interval);
        }

        let core = self.actor.core_mut();
        core.flush_regular_messages();
        core.release_interfaces();
        core.flush_regular_messages();

        if core.is_shutting_down() {
            core.finish_shutdown();
        }
    }

    fn flush_system_messages(&mut self) {
        self.actor.core_mut().flush_system_messages();
    }

    fn log(&mut self, message: String) {
        Actor::log(&mut self.actor, message);
    }

    fn task_scheduler(&mut self) -> &mut TaskScheduler {
        self.actor.core_mut().task_scheduler_mut()
    }

    fn interfaces(&self) -> Vec<ActorKey> {
        self.actor.core().interfaces()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Worker;
    use crate::key::Subject;
    use crate::mailbox::Mailbox;
    use crate::message::downcast_ref;
    use crate::task_scheduler::TaskOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Greeting(&'static str);
    impl Message for Greeting {}

    struct Greeter {
        core: ActorCore,
        received: Vec<(ActorKey, &'static str)>,
        grants: Vec<ActorKey>,
        shutdowns: Vec<bool>,
        due_now_runs: Option<Arc<AtomicUsize>>,
    }

    impl Greeter {
        fn new() -> Self {
            Self {
                core: ActorCore::new(ActorKey::for_subject(Subject::Logic)),
                received: Vec::new(),
                grants: Vec::new(),
                shutdowns: Vec::new(),
                due_now_runs: None,
            }
        }
    }

    impl Actor for Greeter {
        fn core(&self) -> &ActorCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ActorCore {
            &mut self.core
        }

        fn register_handlers(handlers: &mut HandlerTable<Self>) {
            handlers.register(|actor: &mut Greeter, source, message: Arc<Greeting>| {
                actor.received.push((source, message.0));
            });
        }

        fn on_service(&mut self, now: f64) {
            if let Some(runs) = &self.due_now_runs {
                let runs = Arc::clone(runs);
                self.core.task_scheduler_mut().schedule(
                    Box::new(move |_: f64| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        TaskOutcome::Done
                    }),
                    now,
                );
            }
        }

        fn on_interface_added(&mut self, key: ActorKey) {
            self.grants.push(key);
        }

        fn on_shutdown(&mut self, is_hard: bool) {
            self.shutdowns.push(is_hard);
        }
    }

    /// Mailboxes the manager would own for one hosted actor
    struct Harness {
        process: VirtualProcess<Greeter>,
        inbox: Mailbox,
        manager: Mailbox,
        logging: Mailbox,
    }

    const ME: ActorKey = ActorKey::new(Subject::Logic, 1, 1);
    const PEER: ActorKey = ActorKey::new(Subject::Ai, 1, 1);
    const CONTEXT: ExecutionContext = ExecutionContext {
        domain: TimeDomain::Logical,
        worker: Worker::ManagerThread,
    };

    impl Harness {
        fn new() -> Self {
            let mut process = VirtualProcess::new(Greeter::new());
            process.initialize(ME);

            let inbox = Mailbox::new(ME);
            let manager = Mailbox::new(MANAGER_KEY);
            let logging = Mailbox::new(LOGGING_KEY);
            process.set_own_mailbox(inbox.reader());
            process.set_manager_mailbox(manager.writer());
            process.set_logging_mailbox(logging.writer());

            Self {
                process,
                inbox,
                manager,
                logging,
            }
        }

        fn deliver<M: Message>(&self, source: ActorKey, message: M) {
            let mut frame = MessageFrame::new(source);
            frame.push(Arc::new(message));
            self.inbox.add_frame(frame);
        }

        fn run(&mut self, now: f64) {
            self.process.service(now, Some(&CONTEXT));
            self.process.flush_system_messages();
        }

        fn manager_messages(&self) -> Vec<SharedMessage> {
            self.manager
                .reader()
                .remove_frames()
                .into_iter()
                .flat_map(MessageFrame::into_messages)
                .collect()
        }
    }

    fn reschedule_times(messages: &[SharedMessage]) -> Vec<f64> {
        messages
            .iter()
            .filter_map(|m| downcast_ref::<RescheduleActorMessage>(m).map(|r| r.time))
            .collect()
    }

    #[test]
    fn test_first_service_starts_running_and_reschedules() {
        let mut harness = Harness::new();
        assert_eq!(harness.process.state(), ActorState::Initializing);

        harness.run(2.0);
        assert_eq!(harness.process.state(), ActorState::Running);
        assert_eq!(reschedule_times(&harness.manager_messages()), vec![2.0 + DEFAULT_RESCHEDULE_INTERVAL]);
    }

    #[test]
    fn test_reschedule_uses_earlier_private_task() {
        let mut harness = Harness::new();
        harness
            .process
            .task_scheduler()
            .schedule(Box::new(|_: f64| TaskOutcome::Done), 1.05);

        harness.run(1.0);
        assert_eq!(reschedule_times(&harness.manager_messages()), vec![1.05]);
    }

    #[test]
    fn test_task_scheduled_for_now_in_on_service_runs_same_call() {
        let mut harness = Harness::new();
        let runs = Arc::new(AtomicUsize::new(0));
        harness.process.actor_mut().due_now_runs = Some(Arc::clone(&runs));

        harness.run(0.0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(reschedule_times(&harness.manager_messages()), vec![DEFAULT_RESCHEDULE_INTERVAL]);

        harness.run(DEFAULT_RESCHEDULE_INTERVAL);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(
            reschedule_times(&harness.manager_messages()),
            vec![DEFAULT_RESCHEDULE_INTERVAL + DEFAULT_RESCHEDULE_INTERVAL]
        );
    }

    #[test]
    fn test_messages_dispatched_in_order() {
        let mut harness = Harness::new();
        harness.deliver(PEER, Greeting("hello"));
        harness.deliver(PEER, Greeting("again"));

        harness.run(0.0);
        assert_eq!(
            harness.process.actor().received,
            vec![(PEER, "hello"), (PEER, "again")]
        );
    }

    #[test]
    #[should_panic(expected = "no handler registered")]
    fn test_unknown_message_is_fatal() {
        #[derive(Debug)]
        struct Stray;
        impl Message for Stray {}

        let mut harness = Harness::new();
        harness.deliver(PEER, Stray);
        harness.run(0.0);
    }

    #[test]
    fn test_regular_messages_wait_for_interface() {
        let mut harness = Harness::new();
        let peer = Mailbox::new(PEER);

        harness.process.actor_mut().core_mut().send(PEER, Greeting("queued"));
        harness.run(0.0);
        assert_eq!(harness.process.actor().core().pending_message_count(), 1);

        harness.deliver(
            MANAGER_KEY,
            AddInterfaceMessage {
                key: PEER,
                mailbox: peer.writer(),
            },
        );
        harness.run(0.1);
        assert_eq!(harness.process.actor().core().pending_message_count(), 0);
        assert_eq!(peer.reader().remove_frames().len(), 1);
        assert_eq!(harness.process.actor().grants, vec![PEER]);
    }

    #[test]
    fn test_duplicate_interface_grant_ignored() {
        let mut harness = Harness::new();
        let first = Mailbox::new(PEER);
        let second = Mailbox::new(PEER);
        for mailbox in [&first, &second] {
            harness.deliver(
                MANAGER_KEY,
                AddInterfaceMessage {
                    key: PEER,
                    mailbox: mailbox.writer(),
                },
            );
        }

        harness.run(0.0);
        harness.process.actor_mut().core_mut().send(PEER, Greeting("hi"));
        harness.run(0.1);

        assert_eq!(first.pending_frames(), 1);
        assert_eq!(second.pending_frames(), 0);
        assert_eq!(harness.process.actor().grants.len(), 2);
    }

    #[test]
    fn test_system_messages_wait_for_flush() {
        let mut harness = Harness::new();
        harness.process.actor_mut().core_mut().log("hello log");
        harness.process.service(0.0, Some(&CONTEXT));
        assert_eq!(harness.manager.pending_frames(), 0);
        assert_eq!(harness.logging.pending_frames(), 0);

        harness.process.flush_system_messages();
        assert_eq!(harness.manager.pending_frames(), 1);
        assert_eq!(harness.logging.pending_frames(), 1);
    }

    #[test]
    fn test_interface_release_acknowledged() {
        let mut harness = Harness::new();
        let peer = Mailbox::new(PEER);
        harness.deliver(
            MANAGER_KEY,
            AddInterfaceMessage {
                key: PEER,
                mailbox: peer.writer(),
            },
        );
        harness.run(0.0);
        harness.manager_messages();

        harness.deliver(MANAGER_KEY, ShutdownInterfaceMessage { key: PEER });
        harness.run(0.1);

        assert!(!harness.process.actor().core().has_interface(PEER));
        let acks: Vec<_> = harness
            .manager_messages()
            .iter()
            .filter_map(|m| downcast_ref::<ShutdownInterfaceAcknowledgement>(m).map(|a| a.shutdown_key))
            .collect();
        assert_eq!(acks, vec![PEER]);
    }

    #[test]
    fn test_release_of_unheld_interface_discards_queue() {
        let mut harness = Harness::new();
        harness.process.actor_mut().core_mut().send(PEER, Greeting("never"));
        harness.deliver(MANAGER_KEY, ShutdownInterfaceMessage { key: PEER });

        harness.run(0.0);
        assert_eq!(harness.process.actor().core().pending_message_count(), 0);
    }

    #[test]
    fn test_soft_shutdown_delivers_then_stops() {
        let mut harness = Harness::new();
        let peer = Mailbox::new(PEER);
        harness.deliver(
            MANAGER_KEY,
            AddInterfaceMessage {
                key: PEER,
                mailbox: peer.writer(),
            },
        );
        harness.run(0.0);
        harness.manager_messages();

        harness.process.actor_mut().core_mut().send(PEER, Greeting("bye"));
        harness.deliver(MANAGER_KEY, ShutdownSelfRequest { is_hard: false });
        harness.run(0.1);

        assert_eq!(harness.process.state(), ActorState::ShuttingDownSoft);
        assert_eq!(peer.pending_frames(), 1);
        assert!(harness.process.interfaces().is_empty());
        assert_eq!(harness.process.actor().shutdowns, vec![false]);

        let messages = harness.manager_messages();
        assert!(reschedule_times(&messages).is_empty());
        assert!(messages
            .iter()
            .any(|m| downcast_ref::<ShutdownSelfAcknowledgement>(m).is_some()));

        // Terminal: later calls do nothing
        harness.deliver(PEER, Greeting("ignored"));
        harness.run(0.2);
        assert!(harness.process.actor().received.is_empty());
    }

    #[test]
    fn test_hard_shutdown_discards_regular_messages() {
        let mut harness = Harness::new();
        let peer = Mailbox::new(PEER);
        harness.deliver(
            MANAGER_KEY,
            AddInterfaceMessage {
                key: PEER,
                mailbox: peer.writer(),
            },
        );
        harness.run(0.0);

        harness.process.actor_mut().core_mut().send(PEER, Greeting("lost"));
        harness.deliver(MANAGER_KEY, ShutdownSelfRequest { is_hard: true });
        harness.run(0.1);

        assert_eq!(harness.process.state(), ActorState::ShuttingDownHard);
        assert_eq!(peer.pending_frames(), 0);
        assert!(harness
            .manager_messages()
            .iter()
            .any(|m| downcast_ref::<ShutdownSelfAcknowledgement>(m).is_some()));
    }

    #[test]
    #[should_panic(expected = "second shutdown request")]
    fn test_repeated_shutdown_request_is_fatal() {
        let mut harness = Harness::new();
        harness.deliver(MANAGER_KEY, ShutdownSelfRequest { is_hard: false });
        harness.deliver(MANAGER_KEY, ShutdownSelfRequest { is_hard: true });
        harness.run(0.0);
    }

    #[test]
    #[should_panic(expected = "instead of the manager")]
    fn test_shutdown_request_from_peer_is_fatal() {
        let mut harness = Harness::new();
        harness.deliver(PEER, ShutdownSelfRequest { is_hard: false });
        harness.run(0.0);
    }

    #[test]
    fn test_log_goes_to_logging_frame() {
        let mut harness = Harness::new();
        harness.process.log("from host".to_string());
        harness.run(0.0);

        let frames = harness.logging.reader().remove_frames();
        assert_eq!(frames.len(), 1);
        let request = downcast_ref::<LogRequest>(&frames[0].messages()[0]).map(|r| r.message.clone());
        assert_eq!(request.as_deref(), Some("from host"));
    }
}
