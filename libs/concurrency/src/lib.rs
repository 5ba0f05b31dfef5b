//! Virtual Process Concurrency Runtime
//!
//! In-process actor framework: actors ("virtual processes") own private
//! task schedulers and talk to each other only through mailboxes of message
//! frames. A [`ConcurrencyManager`] hosts them, drives their service calls
//! from a real-time and a logical-time scheduler, hands out mailbox write
//! handles through interface exchange and tears actors down with a
//! two-phase shutdown protocol.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────┐
//!                 │          ConcurrencyManager          │
//!   host ──────►  │  records ─ mailboxes ─ KeyAllocator  │
//!  (logical time) │  real TaskScheduler  logical ditto   │
//!                 └──────┬───────────────────▲───────────┘
//!       ExecuteActorTask │ Executor          │ control messages
//!        (inline/pooled) ▼                   │ (manager mailbox)
//!                 ┌──────────────┐   frames  ┌──────────────┐
//!                 │  Actor A     │ ────────► │  Actor B     │
//!                 │  ActorCore   │ ◄──────── │  ActorCore   │
//!                 └──────┬───────┘           └──────┬───────┘
//!                        └──── LogRequest ──► LoggingActor ──► LogSink
//! ```
//!
//! # Example
//!
//! ```no_run
//! use concurrency::{Actor, ActorCore, ActorKey, ConcurrencyManager, ManagerConfig, Subject, VirtualProcess};
//!
//! struct Hello {
//!     core: ActorCore,
//! }
//!
//! impl Actor for Hello {
//!     fn core(&self) -> &ActorCore {
//!         &self.core
//!     }
//!
//!     fn core_mut(&mut self) -> &mut ActorCore {
//!         &mut self.core
//!     }
//!
//!     fn on_service(&mut self, _now: f64) {
//!         self.core.log("hello");
//!         self.core.request_manager_shutdown();
//!     }
//! }
//!
//! let mut manager = ConcurrencyManager::new(ManagerConfig::default())?;
//! let root = Hello { core: ActorCore::new(ActorKey::for_subject(Subject::Logic)) };
//! manager.run(VirtualProcess::boxed(root))?;
//! # Ok::<(), concurrency::ConcurrencyError>(())
//! ```

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod interface_exchange;
pub mod key;
pub mod key_allocator;
pub mod logging;
pub mod mailbox;
pub mod manager;
pub mod message;
pub mod messages;
pub mod metrics;
pub mod priority_queue;
pub mod record;
pub mod task_scheduler;

pub use actor::{Actor, ActorCore, ActorState, ManagedActor, VirtualProcess};
pub use clock::TimeDomain;
pub use config::{ExecutionMode, LogSinkKind, ManagerConfig};
pub use error::{ConcurrencyError, Result};
pub use executor::{ExecutionContext, Executor};
pub use key::{ActorKey, Subject, ALL_ACTORS, LOGGING_KEY, MANAGER_KEY};
pub use logging::{FileLogSink, LogSink, LoggingActor, MemoryLogSink, TracingLogSink};
pub use mailbox::{Mailbox, ReadOnlyMailbox, WriteOnlyMailbox};
pub use manager::{ConcurrencyManager, ManagerState};
pub use message::{downcast_ref, HandlerTable, Message, MessageFrame, SharedMessage};
pub use metrics::MetricsSnapshot;
pub use priority_queue::PriorityQueue;
pub use record::RecordState;
pub use task_scheduler::{ScheduledTask, TaskHandle, TaskOutcome, TaskScheduler};

#[doc(hidden)]
pub use tracing as __tracing;
