//! Actor execution
//!
//! When an actor's "run me" task comes due, the manager hands the actor to
//! an [`Executor`]:
//!
//! - **Inline**: the service call runs on the manager thread before the
//!   scheduler moves on. Deterministic; used by tests.
//! - **Pooled**: the call is pushed onto a tokio worker pool with
//!   `spawn_blocking` and the manager keeps dispatching.
//!
//! An actor is normally re-dispatched only after its own reschedule request
//! reaches the manager at the very end of its service call. Shutdown wakes
//! can dispatch it early; the per-actor mutex serializes those calls.

use crate::actor::ManagedActor;
use crate::clock::TimeDomain;
use crate::config::{ExecutionConfig, ExecutionMode};
use crate::error::{ConcurrencyError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, trace};

/// An actor shared between its manager record and in-flight service calls
pub type SharedActor = Arc<Mutex<Box<dyn ManagedActor>>>;

/// Where a service call is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worker {
    ManagerThread,
    Pool,
}

/// Explicit context handed to every scheduled service call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub domain: TimeDomain,
    pub worker: Worker,
}

struct ExecutorInner {
    runtime: Option<Runtime>,
}

/// Runs actor service calls
#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

impl Executor {
    /// Service actors on the caller's thread
    pub fn inline() -> Self {
        Self {
            inner: Arc::new(ExecutorInner { runtime: None }),
        }
    }

    /// Service actors on a pool of `workers` threads
    pub fn pooled(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ConcurrencyError::configuration(
                "worker_threads must be > 0",
                Some("worker_threads"),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("vproc-worker")
            .build()
            .map_err(|e| ConcurrencyError::runtime_with_source("Failed to build worker pool", e))?;

        debug!(workers, "Worker pool started");
        Ok(Self {
            inner: Arc::new(ExecutorInner {
                runtime: Some(runtime),
            }),
        })
    }

    pub fn from_config(config: &ExecutionConfig) -> Result<Self> {
        match config.mode {
            ExecutionMode::Inline => Ok(Self::inline()),
            ExecutionMode::Pooled => Self::pooled(config.worker_threads),
        }
    }

    pub fn is_pooled(&self) -> bool {
        self.inner.runtime.is_some()
    }

    /// Service `actor` at `now`, then flush its system messages
    pub fn dispatch(&self, actor: SharedActor, now: f64, domain: TimeDomain) {
        match &self.inner.runtime {
            None => {
                let context = ExecutionContext {
                    domain,
                    worker: Worker::ManagerThread,
                };
                run_service(&actor, now, &context);
            }
            Some(runtime) => {
                let context = ExecutionContext {
                    domain,
                    worker: Worker::Pool,
                };
                runtime.spawn_blocking(move || run_service(&actor, now, &context));
            }
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

fn run_service(actor: &SharedActor, now: f64, context: &ExecutionContext) {
    let mut actor = actor.lock();
    trace!(actor = %actor.key(), now, worker = ?context.worker, "Servicing actor");
    actor.service(now, Some(context));
    actor.flush_system_messages();
}
