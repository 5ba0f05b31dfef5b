//! Concurrency Manager
//!
//! Hosts every actor: owns their mailboxes and records, runs the real-time
//! and logical-time schedulers that trigger service calls, brokers
//! interface exchange and drives the two-phase shutdown protocol.
//!
//! ```text
//! service_one_iteration
//!   ├─ handle incoming control messages (manager mailbox)
//!   ├─ flush buffered outbound frames to actor mailboxes
//!   ├─ sample the real clock (logical time is advanced by the host)
//!   ├─ service real-time and logical schedulers ─► Executor::dispatch
//!   └─ shutdown bookkeeping
//! ```
//!
//! # Per-actor shutdown
//!
//! ```text
//!  Running ──initiate_shutdown──► Phase1 ──every other actor released it──►
//!  Phase2 (ShutdownSelfRequest sent) ──ShutdownSelfAcknowledgement──► removed
//! ```
//!
//! # Manager states
//!
//! `PreInitialize → Initialized → Running → ShuttingDownPhase1 →
//! ShuttingDownPhase2 → Finished`. Once only the manager and the logging
//! actor remain, logging is hard-stopped; once only the manager remains the
//! loop ends.

use crate::actor::{ManagedActor, VirtualProcess};
use crate::clock::{ManagerClock, TimeDomain};
use crate::config::ManagerConfig;
use crate::error::Result;
use crate::executor::{Executor, SharedActor};
use crate::interface_exchange::{InterfaceGrant, InterfaceRequest, InterfaceRequests};
use crate::key::{ActorKey, Subject, ALL_ACTORS, LOGGING_KEY, MANAGER_KEY};
use crate::key_allocator::KeyAllocator;
use crate::logging::{LogSink, LoggingActor};
use crate::mailbox::WriteOnlyMailbox;
use crate::message::{HandlerTable, Message, MessageFrame};
use crate::messages::{
    AddActorMessage, AddInterfaceMessage, GetInterfaceRequest, LogRequest, PushInterfaceRequest,
    RescheduleActorMessage, ShutdownActorMessage, ShutdownInterfaceAcknowledgement,
    ShutdownInterfaceMessage, ShutdownManagerMessage, ShutdownSelfAcknowledgement,
    ShutdownSelfRequest,
};
use crate::metrics::{ManagerMetrics, MetricsSnapshot};
use crate::record::{ActorRecord, ExecuteActorTask, RecordState};
use crate::task_scheduler::TaskScheduler;
use crate::{fatal, fatal_assert};
use chrono::Local;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Lifecycle of the manager itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    PreInitialize,
    Initialized,
    Running,
    ShuttingDownPhase1,
    ShuttingDownPhase2,
    Finished,
}

/// Root of an actor system
pub struct ConcurrencyManager {
    config: ManagerConfig,
    state: ManagerState,
    system_id: Uuid,

    records: BTreeMap<ActorKey, ActorRecord>,
    allocator: KeyAllocator,
    requests: InterfaceRequests,
    outbound: BTreeMap<ActorKey, MessageFrame>,
    handlers: Arc<HandlerTable<ConcurrencyManager>>,

    real_scheduler: TaskScheduler,
    logical_scheduler: TaskScheduler,
    clock: ManagerClock,
    executor: Executor,
    metrics: Arc<ManagerMetrics>,

    /// Logging actor waiting for `setup_for_run`
    logging: Option<Box<dyn ManagedActor>>,
}

impl ConcurrencyManager {
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        let executor = Executor::from_config(&config.execution)?;

        let system_id = Uuid::new_v4();
        info!(
            %system_id,
            mode = ?config.execution.mode,
            "Concurrency manager created"
        );

        Ok(Self {
            real_scheduler: TaskScheduler::with_granularity(config.scheduling.real_time_granularity),
            logical_scheduler: TaskScheduler::with_granularity(
                config.scheduling.logical_time_granularity,
            ),
            config,
            state: ManagerState::PreInitialize,
            system_id,
            records: BTreeMap::new(),
            allocator: KeyAllocator::new(),
            requests: InterfaceRequests::new(),
            outbound: BTreeMap::new(),
            handlers: Arc::new(HandlerTable::new()),
            clock: ManagerClock::new(),
            executor,
            metrics: Arc::new(ManagerMetrics::default()),
            logging: None,
        })
    }

    /// Register handlers and build the logging actor from the configured
    /// sink
    pub fn initialize(&mut self) -> Result<()> {
        let logging = LoggingActor::from_config(&self.config.logging)?;
        self.initialize_with_logging(logging);
        Ok(())
    }

    /// [`initialize`](Self::initialize) with a caller-supplied log sink
    pub fn initialize_with_sink(&mut self, sink: Box<dyn LogSink>) {
        self.initialize_with_logging(LoggingActor::new(sink));
    }

    fn initialize_with_logging(&mut self, logging: LoggingActor) {
        fatal_assert!(
            self.state == ManagerState::PreInitialize,
            "manager initialized twice (state {:?})",
            self.state
        );

        self.handlers = Arc::new(Self::default_handlers());
        self.logging = Some(VirtualProcess::boxed(logging));
        self.set_state(ManagerState::Initialized);
    }

    /// Create the manager record, seed the logging grant, add the logging
    /// and root actors and reset both clocks
    pub fn setup_for_run(&mut self, root: Box<dyn ManagedActor>) {
        fatal_assert!(
            self.state == ManagerState::Initialized,
            "setup_for_run in state {:?}",
            self.state
        );

        self.allocator.add_tracked(MANAGER_KEY);
        self.records.insert(MANAGER_KEY, ActorRecord::manager_proxy());
        self.requests
            .add_persistent(InterfaceRequest::push(LOGGING_KEY, ALL_ACTORS));
        self.set_state(ManagerState::Running);

        if let Some(logging) = self.logging.take() {
            self.add_actor(logging);
        }
        self.add_actor(root);

        self.clock.reset();
    }

    /// Host `root` and service until every actor has shut down.
    ///
    /// Logical time follows real time scaled by
    /// `scheduling.logical_time_scale`; the host may still advance it.
    pub fn run(&mut self, root: Box<dyn ManagedActor>) -> Result<()> {
        if self.state == ManagerState::PreInitialize {
            self.initialize()?;
        }
        self.setup_for_run(root);

        let mut last_real = self.clock.real_elapsed();
        while !self.records.is_empty() {
            self.follow_real_time(&mut last_real);
            self.service_one_iteration();
            self.idle();
        }

        self.shutdown();
        Ok(())
    }

    /// One pass of the dispatch loop
    pub fn service_one_iteration(&mut self) {
        self.metrics.record_iteration();

        self.handle_incoming();
        self.flush_outbound();

        let real_now = self.clock.advance_real();
        let logical_now = self.clock.logical_elapsed();
        self.real_scheduler.service(real_now);
        self.logical_scheduler.service(logical_now);

        self.service_shutdown();
    }

    /// Finish after the loop has drained every record
    pub fn shutdown(&mut self) {
        fatal_assert!(
            self.records.is_empty(),
            "manager finished with {} actors still hosted",
            self.records.len()
        );

        self.real_scheduler.clear();
        self.logical_scheduler.clear();
        self.outbound.clear();
        self.set_state(ManagerState::Finished);

        let snapshot = self.metrics.snapshot();
        info!(
            system_id = %self.system_id,
            actors = snapshot.actors_added,
            services = snapshot.services_dispatched,
            iterations = snapshot.iterations,
            "Concurrency manager finished"
        );
    }

    /// Host an actor. Wildcard key components are allocated. Returns the
    /// final key.
    pub fn add_actor(&mut self, mut actor: Box<dyn ManagedActor>) -> ActorKey {
        let requested = actor.key();
        fatal_assert!(
            requested.subject() != Some(Subject::ConcurrencyManager),
            "cannot add an actor with the manager subject: {}",
            requested
        );

        let key = self.allocator.fill_in(requested);
        fatal_assert!(
            !self.records.contains_key(&key),
            "actor {} is already hosted",
            key
        );
        self.allocator.add_tracked(key);
        actor.initialize(key);

        let domain = actor.time_domain();
        let is_root = actor.is_root();
        let shared: SharedActor = Arc::new(Mutex::new(actor));
        let mut record = ActorRecord::new(key, Arc::clone(&shared), domain);

        {
            let mut actor = shared.lock();
            actor.set_own_mailbox(record.mailbox().reader());
            if let Some(mailbox) = self.mailbox_for(MANAGER_KEY) {
                actor.set_manager_mailbox(mailbox);
            }
            if key != LOGGING_KEY {
                if let Some(mailbox) = self.mailbox_for(LOGGING_KEY) {
                    actor.set_logging_mailbox(mailbox);
                }
            }
        }

        record.mark_running();
        self.records.insert(key, record);
        self.metrics.record_actor_added();
        info!(actor = %key, ?domain, is_root, "Actor added");

        let records = &self.records;
        let grants = self.requests.resolve_new_actor(key, |source| {
            records
                .get(&source)
                .is_some_and(|record| !record.is_shutting_down())
        });
        for grant in grants {
            self.grant_interface(grant);
        }

        if is_root {
            let now = self.clock.elapsed(domain);
            self.schedule_execution(key, now);
        }

        key
    }

    /// Begin the two-phase shutdown of `key`
    pub fn initiate_shutdown(&mut self, key: ActorKey) {
        fatal_assert!(!key.is_reserved(), "cannot shut down reserved {}", key);

        let Some(record) = self.records.get(&key) else {
            debug!(actor = %key, "Shutdown of unknown actor ignored");
            return;
        };
        fatal_assert!(
            !record.is_shutting_down(),
            "{} is already shutting down",
            key
        );

        let notify: BTreeSet<ActorKey> = self
            .records
            .values()
            .filter(|other| {
                other.key() != key
                    && !other.key().is_reserved()
                    && other.state() != RecordState::ShuttingDownPhase2
            })
            .map(ActorRecord::key)
            .collect();

        if let Some(record) = self.records.get_mut(&key) {
            record.begin_phase1(notify.clone());
        }
        self.metrics.record_shutdown_initiated();
        info!(actor = %key, pending = notify.len(), "Actor shutdown phase 1");

        for other in notify.iter().copied() {
            self.send(other, ShutdownInterfaceMessage { key });
            self.wake(other);
        }
        self.requests.purge(key);

        if notify.is_empty() {
            self.enter_phase2(key, false);
        }
    }

    /// Move logical time forward by `delta` seconds
    pub fn advance_logical_time(&mut self, delta: f64) -> f64 {
        self.clock.advance_logical(delta)
    }

    /// Set logical time. It may not move backwards.
    pub fn set_logical_time(&mut self, elapsed: f64) {
        self.clock.set_logical(elapsed);
    }

    pub fn logical_time(&self) -> f64 {
        self.clock.logical_elapsed()
    }

    pub fn real_time(&self) -> f64 {
        self.clock.real_elapsed()
    }

    /// Send a line to the logging actor
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.state == ManagerState::ShuttingDownPhase2 || !self.records.contains_key(&LOGGING_KEY)
        {
            debug!(%message, "Manager log with logging gone");
            return;
        }

        let request = LogRequest {
            source: MANAGER_KEY,
            message,
            timestamp: Local::now(),
            elapsed: self.clock.real_elapsed(),
        };
        self.send(LOGGING_KEY, request);
    }

    /// Service the logging actor without an execution context so it closes
    /// its sink. For abnormal termination paths.
    pub fn close_logging_unsolicited(&self) {
        let Some(actor) = self.records.get(&LOGGING_KEY).and_then(ActorRecord::actor) else {
            return;
        };
        let now = self.clock.real_elapsed();
        let mut actor = actor.lock();
        actor.service(now, None);
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn is_shutting_down(&self) -> bool {
        matches!(
            self.state,
            ManagerState::ShuttingDownPhase1 | ManagerState::ShuttingDownPhase2
        )
    }

    pub fn system_id(&self) -> Uuid {
        self.system_id
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Hosted records, the manager's own included
    pub fn actor_count(&self) -> usize {
        self.records.len()
    }

    pub fn contains(&self, key: ActorKey) -> bool {
        self.records.contains_key(&key)
    }

    pub fn record_state(&self, key: ActorKey) -> Option<RecordState> {
        self.records.get(&key).map(ActorRecord::state)
    }

    pub fn pending_shutdown_keys(&self, key: ActorKey) -> Option<Vec<ActorKey>> {
        self.records
            .get(&key)
            .map(|record| record.pending_shutdown_keys().iter().copied().collect())
    }

    /// Write handle to a hosted actor's mailbox
    pub fn mailbox_for(&self, key: ActorKey) -> Option<WriteOnlyMailbox> {
        self.records.get(&key).map(|record| record.mailbox().writer())
    }

    /// Write handle for host-injected control messages
    pub fn manager_mailbox(&self) -> Option<WriteOnlyMailbox> {
        self.mailbox_for(MANAGER_KEY)
    }

    /// Keys whose mailboxes `key` currently holds
    pub fn held_interfaces(&self, key: ActorKey) -> Option<Vec<ActorKey>> {
        let actor = self.records.get(&key)?.actor()?;
        let interfaces = actor.lock().interfaces();
        Some(interfaces)
    }

    /// When `key` is next due to be serviced
    pub fn execute_time(&self, key: ActorKey) -> Option<f64> {
        let record = self.records.get(&key)?;
        let handle = record.execute_task()?;
        self.scheduler(record.domain()).execute_time(handle)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn set_state(&mut self, state: ManagerState) {
        info!(from = ?self.state, to = ?state, "Manager state");
        self.state = state;
    }

    fn scheduler(&self, domain: TimeDomain) -> &TaskScheduler {
        match domain {
            TimeDomain::RealTime => &self.real_scheduler,
            TimeDomain::Logical => &self.logical_scheduler,
        }
    }

    /// Advance logical time by the scaled real time elapsed since the
    /// previous call
    fn follow_real_time(&mut self, last_real: &mut f64) {
        let now = self.clock.advance_real();
        let scale = self.config.scheduling.logical_time_scale;
        if scale > 0.0 {
            self.clock.advance_logical((now - *last_real) * scale);
        }
        *last_real = now;
    }

    fn idle(&self) {
        let cap = Duration::from_millis(self.config.scheduling.max_idle_sleep_ms);
        let mut wait = self.real_scheduler.next_task_time() - self.clock.real_elapsed();
        let scale = self.config.scheduling.logical_time_scale;
        if scale > 0.0 {
            let logical_wait =
                (self.logical_scheduler.next_task_time() - self.clock.logical_elapsed()) / scale;
            wait = wait.min(logical_wait);
        }
        let wait = wait.max(0.0);
        let sleep = Duration::from_secs_f64(wait.min(cap.as_secs_f64()));

        if sleep.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(sleep);
        }
    }

    fn send<M: Message>(&mut self, destination: ActorKey, message: M) {
        self.outbound
            .entry(destination)
            .or_insert_with(|| MessageFrame::new(MANAGER_KEY))
            .push(Arc::new(message));
    }

    fn handle_incoming(&mut self) {
        let frames = match self.records.get(&MANAGER_KEY) {
            Some(record) => record.mailbox().reader().remove_frames(),
            None => return,
        };

        let handlers = Arc::clone(&self.handlers);
        for frame in frames {
            let source = frame.source();
            for message in frame.into_messages() {
                self.metrics.record_control_message();
                handlers.dispatch(self, source, message);
            }
        }
    }

    fn flush_outbound(&mut self) {
        let records = &self.records;
        let metrics = &self.metrics;

        self.outbound.retain(|destination, frame| {
            let Some(record) = records.get(destination) else {
                trace!(destination = %destination, "Destination unknown, frame kept");
                return true;
            };
            let frame = std::mem::replace(frame, MessageFrame::new(MANAGER_KEY));
            record.mailbox().add_frame(frame);
            metrics.record_frame_delivered();
            false
        });
    }

    fn service_shutdown(&mut self) {
        match self.records.len() {
            2 if self.state != ManagerState::ShuttingDownPhase2
                && self.records.contains_key(&LOGGING_KEY) =>
            {
                self.set_state(ManagerState::ShuttingDownPhase2);
                self.enter_phase2(LOGGING_KEY, true);
            }
            1 if self.records.contains_key(&MANAGER_KEY) => {
                self.records.clear();
                self.allocator.remove_tracked(MANAGER_KEY);
                debug!("Manager record released");
            }
            _ => {}
        }
    }

    /// Run `key` at `time`, unless it is already due no later than that
    fn schedule_execution(&mut self, key: ActorKey, time: f64) {
        let Some(record) = self.records.get_mut(&key) else {
            trace!(actor = %key, "Reschedule of unknown actor ignored");
            return;
        };
        let domain = record.domain();
        let scheduler = match domain {
            TimeDomain::RealTime => &mut self.real_scheduler,
            TimeDomain::Logical => &mut self.logical_scheduler,
        };

        let handle = match record.execute_task() {
            Some(handle) => handle,
            None => {
                let Some(actor) = record.actor() else {
                    return;
                };
                let task = ExecuteActorTask::new(
                    Arc::clone(actor),
                    domain,
                    self.executor.clone(),
                    Arc::clone(&self.metrics),
                );
                let handle = scheduler.insert(Box::new(task));
                record.set_execute_task(handle);
                handle
            }
        };

        if scheduler.is_scheduled(handle) {
            if scheduler
                .execute_time(handle)
                .is_some_and(|scheduled| scheduled <= time)
            {
                return;
            }
            scheduler.remove(handle);
        }
        scheduler.submit(handle, time);
        trace!(actor = %key, time, "Actor scheduled");
    }

    /// Make `key` process newly sent control messages promptly
    fn wake(&mut self, key: ActorKey) {
        let Some(domain) = self.records.get(&key).map(ActorRecord::domain) else {
            return;
        };
        let now = self.clock.elapsed(domain);
        self.schedule_execution(key, now);
    }

    fn enter_phase2(&mut self, key: ActorKey, is_hard: bool) {
        let Some(record) = self.records.get_mut(&key) else {
            return;
        };
        record.enter_phase2();
        info!(actor = %key, hard = is_hard, "Actor shutdown phase 2");

        self.send(key, ShutdownSelfRequest { is_hard });
        self.wake(key);
    }

    fn grant_interface(&mut self, grant: InterfaceGrant) {
        if !self.records.contains_key(&grant.recipient) {
            trace!(recipient = %grant.recipient, "Grant to unknown recipient dropped");
            return;
        }
        let Some(mailbox) = self.mailbox_for(grant.owner) else {
            trace!(owner = %grant.owner, "Grant of unknown mailbox dropped");
            return;
        };

        debug!(owner = %grant.owner, recipient = %grant.recipient, "Interface granted");
        self.metrics.record_interface_granted();
        self.send(
            grant.recipient,
            AddInterfaceMessage {
                key: grant.owner,
                mailbox,
            },
        );
    }

    fn handle_interface_request(&mut self, request: InterfaceRequest) {
        if self.is_shutting_down() {
            trace!(source = %request.source, "Interface request during shutdown ignored");
            return;
        }
        let Some(source) = self.records.get(&request.source) else {
            debug!(source = %request.source, "Interface request from unknown actor ignored");
            return;
        };
        if source.is_shutting_down() {
            return;
        }

        if request.target.is_unique() {
            if request.target == request.source {
                return;
            }
            match self.records.get(&request.target) {
                Some(target) if target.is_shutting_down() => {
                    debug!(target = %request.target, "Interface request for shutting-down actor ignored");
                }
                Some(_) => self.grant_interface(request.grant_for(request.target)),
                None => {
                    debug!(source = %request.source, target = %request.target, "Interface request deferred");
                    self.requests.add_unfulfilled(request);
                }
            }
            return;
        }

        let matches: Vec<ActorKey> = self
            .records
            .values()
            .filter(|record| {
                request.target.matches(record.key())
                    && record.key() != request.source
                    && !record.is_shutting_down()
            })
            .map(ActorRecord::key)
            .collect();
        for key in matches {
            self.grant_interface(request.grant_for(key));
        }
        self.requests.add_persistent(request);
    }

    fn handle_add_actor(&mut self, source: ActorKey, message: &AddActorMessage) {
        let Some(actor) = message.take_actor() else {
            fatal!("add request from {} carries no actor", source);
        };
        if self.is_shutting_down() {
            warn!(source = %source, actor = %actor.key(), "Add request during shutdown dropped");
            return;
        }

        let key = self.add_actor(actor);
        let creator_available = self
            .records
            .get(&source)
            .is_some_and(|record| !record.is_shutting_down());
        if !creator_available {
            debug!(source = %source, actor = %key, "Creator shutting down, no interfaces exchanged");
            return;
        }

        if message.return_interface {
            self.grant_interface(InterfaceGrant {
                owner: key,
                recipient: source,
            });
        }
        if message.forward_creator_interface {
            self.grant_interface(InterfaceGrant {
                owner: source,
                recipient: key,
            });
        }
    }

    fn handle_interface_release(&mut self, source: ActorKey, shutdown_key: ActorKey) {
        if self.is_shutting_down() {
            return;
        }
        let Some(record) = self.records.get_mut(&shutdown_key) else {
            return;
        };
        fatal_assert!(
            record.state() == RecordState::ShuttingDownPhase1,
            "interface release for {} which is in {:?}",
            shutdown_key,
            record.state()
        );

        if record.acknowledge(source) {
            self.enter_phase2(shutdown_key, false);
        }
    }

    fn handle_shutdown_self_acknowledgement(&mut self, source: ActorKey) {
        let Some(record) = self.records.get(&source) else {
            fatal!("shutdown acknowledgement from unknown {}", source);
        };
        fatal_assert!(
            record.state() == RecordState::ShuttingDownPhase2 || self.is_shutting_down(),
            "unexpected shutdown acknowledgement from {} in {:?}",
            source,
            record.state()
        );
        self.remove_record(source);
    }

    fn handle_manager_shutdown(&mut self) {
        if self.is_shutting_down() {
            return;
        }
        self.set_state(ManagerState::ShuttingDownPhase1);

        let targets: Vec<ActorKey> = self
            .records
            .values()
            .filter(|record| {
                !record.key().is_reserved() && record.state() != RecordState::ShuttingDownPhase2
            })
            .map(ActorRecord::key)
            .collect();
        for key in targets {
            self.enter_phase2(key, true);
        }
    }

    fn remove_record(&mut self, key: ActorKey) {
        let Some(record) = self.records.remove(&key) else {
            return;
        };

        if let Some(handle) = record.execute_task() {
            match record.domain() {
                TimeDomain::RealTime => self.real_scheduler.take(handle),
                TimeDomain::Logical => self.logical_scheduler.take(handle),
            };
        }
        self.allocator.remove_tracked(key);
        self.requests.purge(key);
        if self.outbound.remove(&key).is_some() {
            self.metrics.record_frame_dropped();
        }

        let ready: Vec<ActorKey> = self
            .records
            .values_mut()
            .filter(|other| other.state() == RecordState::ShuttingDownPhase1)
            .filter_map(|other| other.acknowledge(key).then(|| other.key()))
            .collect();
        for other in ready {
            self.enter_phase2(other, false);
        }

        self.metrics.record_actor_removed();
        info!(actor = %key, remaining = self.records.len(), "Actor removed");
    }

    fn default_handlers() -> HandlerTable<ConcurrencyManager> {
        let mut handlers = HandlerTable::new();
        handlers.register(|manager: &mut Self, _, m: Arc<GetInterfaceRequest>| {
            manager.handle_interface_request(InterfaceRequest::get(m.source, m.target));
        });
        handlers.register(|manager: &mut Self, _, m: Arc<PushInterfaceRequest>| {
            manager.handle_interface_request(InterfaceRequest::push(m.source, m.target));
        });
        handlers.register(|manager: &mut Self, source, m: Arc<AddActorMessage>| {
            manager.handle_add_actor(source, &m);
        });
        handlers.register(|manager: &mut Self, _, m: Arc<RescheduleActorMessage>| {
            manager.schedule_execution(m.key, m.time);
        });
        handlers.register(|manager: &mut Self, _, m: Arc<ShutdownActorMessage>| {
            if manager.is_shutting_down() {
                return;
            }
            manager.initiate_shutdown(m.key);
        });
        handlers.register(
            |manager: &mut Self, source, m: Arc<ShutdownInterfaceAcknowledgement>| {
                manager.handle_interface_release(source, m.shutdown_key);
            },
        );
        handlers.register(|manager: &mut Self, source, _: Arc<ShutdownSelfAcknowledgement>| {
            manager.handle_shutdown_self_acknowledgement(source);
        });
        handlers.register(|manager: &mut Self, _, _: Arc<ShutdownManagerMessage>| {
            manager.handle_manager_shutdown();
        });
        handlers
    }
}

impl fmt::Debug for ConcurrencyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrencyManager")
            .field("system_id", &self.system_id)
            .field("state", &self.state)
            .field("actors", &self.records.keys().collect::<Vec<_>>())
            .field("executor", &self.executor)
            .finish()
    }
}
