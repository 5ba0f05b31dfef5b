//! Manager-side actor records

use crate::clock::TimeDomain;
use crate::executor::{Executor, SharedActor};
use crate::key::{ActorKey, MANAGER_KEY};
use crate::mailbox::Mailbox;
use crate::metrics::ManagerMetrics;
use crate::task_scheduler::{ScheduledTask, TaskHandle, TaskOutcome};
use crate::fatal_assert;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of an actor as tracked by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Initializing,
    Running,
    /// Waiting for every other actor to release its handle
    ShuttingDownPhase1,
    /// Told to stop, waiting for its acknowledgement
    ShuttingDownPhase2,
}

/// One hosted actor: its mailbox, its recurring execute task and its
/// shutdown bookkeeping
pub struct ActorRecord {
    key: ActorKey,
    /// `None` for the manager's own record
    actor: Option<SharedActor>,
    domain: TimeDomain,
    mailbox: Mailbox,
    execute_task: Option<TaskHandle>,
    state: RecordState,
    pending_shutdown_keys: BTreeSet<ActorKey>,
}

impl ActorRecord {
    pub fn new(key: ActorKey, actor: SharedActor, domain: TimeDomain) -> Self {
        Self {
            key,
            actor: Some(actor),
            domain,
            mailbox: Mailbox::new(key),
            execute_task: None,
            state: RecordState::Initializing,
            pending_shutdown_keys: BTreeSet::new(),
        }
    }

    /// Record standing in for the manager itself
    pub fn manager_proxy() -> Self {
        Self {
            key: MANAGER_KEY,
            actor: None,
            domain: TimeDomain::RealTime,
            mailbox: Mailbox::new(MANAGER_KEY),
            execute_task: None,
            state: RecordState::Running,
            pending_shutdown_keys: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> ActorKey {
        self.key
    }

    pub fn actor(&self) -> Option<&SharedActor> {
        self.actor.as_ref()
    }

    pub fn domain(&self) -> TimeDomain {
        self.domain
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_shutting_down(&self) -> bool {
        matches!(
            self.state,
            RecordState::ShuttingDownPhase1 | RecordState::ShuttingDownPhase2
        )
    }

    pub fn execute_task(&self) -> Option<TaskHandle> {
        self.execute_task
    }

    pub fn set_execute_task(&mut self, handle: TaskHandle) {
        self.execute_task = Some(handle);
    }

    pub fn mark_running(&mut self) {
        if self.state == RecordState::Initializing {
            self.state = RecordState::Running;
        }
    }

    pub fn pending_shutdown_keys(&self) -> &BTreeSet<ActorKey> {
        &self.pending_shutdown_keys
    }

    /// Enter phase 1 waiting on `pending` acknowledgements
    pub fn begin_phase1(&mut self, pending: BTreeSet<ActorKey>) {
        fatal_assert!(
            !self.is_shutting_down(),
            "{} is already shutting down",
            self.key
        );
        self.state = RecordState::ShuttingDownPhase1;
        self.pending_shutdown_keys = pending;
    }

    /// Drop `from` from the pending set. True when this emptied the set.
    pub fn acknowledge(&mut self, from: ActorKey) -> bool {
        self.pending_shutdown_keys.remove(&from) && self.pending_shutdown_keys.is_empty()
    }

    pub fn enter_phase2(&mut self) {
        self.state = RecordState::ShuttingDownPhase2;
        self.pending_shutdown_keys.clear();
    }
}

impl fmt::Debug for ActorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRecord")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("domain", &self.domain)
            .field("execute_task", &self.execute_task)
            .field("pending_shutdown_keys", &self.pending_shutdown_keys)
            .finish()
    }
}

/// Recurring "service this actor now" task kept in a manager scheduler
pub struct ExecuteActorTask {
    actor: SharedActor,
    domain: TimeDomain,
    executor: Executor,
    metrics: Arc<ManagerMetrics>,
}

impl ExecuteActorTask {
    pub fn new(
        actor: SharedActor,
        domain: TimeDomain,
        executor: Executor,
        metrics: Arc<ManagerMetrics>,
    ) -> Self {
        Self {
            actor,
            domain,
            executor,
            metrics,
        }
    }
}

impl ScheduledTask for ExecuteActorTask {
    fn execute(&mut self, now: f64) -> TaskOutcome {
        self.metrics.record_service_dispatched();
        self.executor
            .dispatch(Arc::clone(&self.actor), now, self.domain);
        TaskOutcome::Done
    }
}
