//! Time-Ordered Task Scheduler
//!
//! Tasks live in an arena keyed by [`TaskHandle`]; the heap stores
//! `(execute_time, handle)` entries and a [`HeapSlots`] movement policy keeps
//! a side table of where each handle currently sits. That table is what makes
//! [`TaskScheduler::remove`] O(log n).
//!
//! Two ways to hand a task over:
//!
//! - [`TaskScheduler::schedule`] for one-shot work. The task is dropped once
//!   it reports [`TaskOutcome::Done`].
//! - [`TaskScheduler::insert`] + [`TaskScheduler::submit`] for recurring
//!   work. The task stays parked in the arena after `Done` so the owner can
//!   `submit` the same handle again later, and leaves only through
//!   [`TaskScheduler::take`].

use crate::priority_queue::{Comparator, MovementPolicy, PriorityQueue};
use crate::{fatal, fatal_assert};
use std::collections::HashMap;
use std::fmt;

/// Fraction of a granule below which a time is considered already aligned
pub const TIME_GRANULARITY_FRACTION_CUTOFF: f64 = 0.00001;

/// Result of running a task
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskOutcome {
    Done,
    /// Run again at the given time, which must be later than `now`
    Reschedule(f64),
}

/// Unit of work run by a [`TaskScheduler`]
pub trait ScheduledTask: Send {
    fn execute(&mut self, now: f64) -> TaskOutcome;
}

impl<F> ScheduledTask for F
where
    F: FnMut(f64) -> TaskOutcome + Send,
{
    fn execute(&mut self, now: f64) -> TaskOutcome {
        self(now)
    }
}

/// Stable identifier of a task inside one scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Heap entry
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEntry {
    pub execute_time: f64,
    pub handle: TaskHandle,
}

/// Orders entries by time, then by submission order
#[derive(Debug, Default)]
pub struct EarliestFirst;

impl Comparator<ScheduleEntry> for EarliestFirst {
    fn less(&self, a: &ScheduleEntry, b: &ScheduleEntry) -> bool {
        a.execute_time < b.execute_time
            || (a.execute_time == b.execute_time && a.handle < b.handle)
    }
}

/// Side table of heap slots per handle
#[derive(Debug, Default)]
pub struct HeapSlots(HashMap<TaskHandle, usize>);

impl HeapSlots {
    /// Current 1-based slot, `0` when not scheduled
    pub fn slot(&self, handle: TaskHandle) -> usize {
        self.0.get(&handle).copied().unwrap_or(0)
    }
}

impl MovementPolicy<ScheduleEntry> for HeapSlots {
    fn set_index(&mut self, item: &ScheduleEntry, index: usize) {
        if index == 0 {
            self.0.remove(&item.handle);
        } else {
            self.0.insert(item.handle, index);
        }
    }
}

struct TaskSlot {
    task: Box<dyn ScheduledTask>,
    /// Kept in the arena after completing
    retained: bool,
}

/// Runs tasks in execution-time order
pub struct TaskScheduler {
    queue: PriorityQueue<ScheduleEntry, EarliestFirst, HeapSlots>,
    tasks: HashMap<TaskHandle, TaskSlot>,
    next_handle: u64,
    granularity: f64,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::with_granularity(0.0)
    }

    /// Scheduler that rounds execution times up to multiples of `granularity`
    /// seconds. `0.0` disables rounding.
    pub fn with_granularity(granularity: f64) -> Self {
        fatal_assert!(
            granularity >= 0.0,
            "task scheduler granularity must be >= 0, got {}",
            granularity
        );
        Self {
            queue: PriorityQueue::with_parts(EarliestFirst, HeapSlots::default()),
            tasks: HashMap::new(),
            next_handle: 1,
            granularity,
        }
    }

    pub fn granularity(&self) -> f64 {
        self.granularity
    }

    /// Park a recurring task in the arena without scheduling it
    pub fn insert(&mut self, task: Box<dyn ScheduledTask>) -> TaskHandle {
        self.register(task, true)
    }

    /// Schedule a one-shot task
    pub fn schedule(&mut self, task: Box<dyn ScheduledTask>, execute_time: f64) -> TaskHandle {
        let handle = self.register(task, false);
        self.submit(handle, execute_time);
        handle
    }

    /// Put a known task into the queue.
    ///
    /// Submitting a task that is already scheduled is a protocol violation.
    pub fn submit(&mut self, handle: TaskHandle, execute_time: f64) {
        fatal_assert!(
            self.tasks.contains_key(&handle),
            "submit of unknown {}",
            handle
        );
        fatal_assert!(
            !self.is_scheduled(handle),
            "{} is already scheduled",
            handle
        );

        self.queue.insert(ScheduleEntry {
            execute_time: self.quantize(execute_time),
            handle,
        });
    }

    /// Pull a scheduled task out of the queue. The task stays in the arena.
    ///
    /// Removing a task that is not scheduled is a protocol violation.
    pub fn remove(&mut self, handle: TaskHandle) {
        let slot = self.queue.policy().slot(handle);
        fatal_assert!(slot != 0, "remove of unscheduled {}", handle);
        self.queue.remove_by_index(slot);
    }

    /// Release a task from the arena, unscheduling it first if needed
    pub fn take(&mut self, handle: TaskHandle) -> Option<Box<dyn ScheduledTask>> {
        if self.is_scheduled(handle) {
            self.remove(handle);
        }
        self.tasks.remove(&handle).map(|slot| slot.task)
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.queue.policy().slot(handle) != 0
    }

    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }

    /// Effective execution time of a scheduled task
    pub fn execute_time(&self, handle: TaskHandle) -> Option<f64> {
        self.queue
            .get(self.queue.policy().slot(handle))
            .map(|entry| entry.execute_time)
    }

    /// Number of scheduled tasks
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Earliest scheduled time, or infinity when nothing is scheduled
    pub fn next_task_time(&self) -> f64 {
        self.queue
            .peek()
            .map(|entry| entry.execute_time)
            .unwrap_or(f64::INFINITY)
    }

    /// Run every task due at or before `now`. Returns how many ran.
    pub fn service(&mut self, now: f64) -> usize {
        let mut executed = 0;

        while self
            .queue
            .peek()
            .is_some_and(|entry| entry.execute_time <= now)
        {
            let Some(entry) = self.queue.pop() else {
                break;
            };

            let outcome = match self.tasks.get_mut(&entry.handle) {
                Some(slot) => slot.task.execute(now),
                None => fatal!("scheduled {} missing from arena", entry.handle),
            };
            executed += 1;

            match outcome {
                TaskOutcome::Reschedule(next) => {
                    fatal_assert!(
                        next > now,
                        "{} rescheduled to {} which is not after {}",
                        entry.handle,
                        next,
                        now
                    );
                    self.submit(entry.handle, next);
                }
                TaskOutcome::Done => {
                    if self.tasks.get(&entry.handle).is_some_and(|slot| !slot.retained) {
                        self.tasks.remove(&entry.handle);
                    }
                }
            }
        }

        executed
    }

    /// Unschedule everything and empty the arena
    pub fn clear(&mut self) {
        self.queue.clear();
        self.tasks.clear();
    }

    fn register(&mut self, task: Box<dyn ScheduledTask>, retained: bool) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.tasks.insert(handle, TaskSlot { task, retained });
        handle
    }

    fn quantize(&self, execute_time: f64) -> f64 {
        if self.granularity <= 0.0 {
            return execute_time;
        }

        let fraction = execute_time / self.granularity;
        let granules = fraction.floor();
        if fraction - granules > TIME_GRANULARITY_FRACTION_CUTOFF {
            (granules + 1.0) * self.granularity
        } else {
            execute_time
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("scheduled", &self.queue.len())
            .field("tasks", &self.tasks.len())
            .field("granularity", &self.granularity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<(u32, f64)>>>, id: u32) -> Box<dyn ScheduledTask> {
        let log = Arc::clone(log);
        Box::new(move |now: f64| {
            log.lock().push((id, now));
            TaskOutcome::Done
        })
    }

    #[test]
    fn test_runs_due_tasks_in_time_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(recorder(&log, 3), 3.0);
        scheduler.schedule(recorder(&log, 1), 1.0);
        scheduler.schedule(recorder(&log, 2), 2.0);

        assert_eq!(scheduler.next_task_time(), 1.0);
        assert_eq!(scheduler.service(2.0), 2);
        assert_eq!(*log.lock(), vec![(1, 2.0), (2, 2.0)]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.next_task_time(), 3.0);
    }

    #[test]
    fn test_empty_next_time_is_infinite() {
        let scheduler = TaskScheduler::new();
        assert!(scheduler.next_task_time().is_infinite());
    }

    #[test]
    fn test_reschedule_runs_again() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(
            Box::new(move |now: f64| {
                *counter.lock() += 1;
                if now < 3.0 {
                    TaskOutcome::Reschedule(now + 1.0)
                } else {
                    TaskOutcome::Done
                }
            }),
            1.0,
        );

        for now in [1.0, 2.0, 3.0, 4.0] {
            scheduler.service(now);
        }
        assert_eq!(*count.lock(), 3);
        assert!(scheduler.is_empty());
    }

    #[test]
    #[should_panic(expected = "not after")]
    fn test_reschedule_loop_is_fatal() {
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(Box::new(|now: f64| TaskOutcome::Reschedule(now)), 1.0);
        scheduler.service(1.0);
    }

    #[test]
    fn test_remove_cancels_task() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = TaskScheduler::new();
        let keep = scheduler.schedule(recorder(&log, 1), 1.0);
        let cancel = scheduler.schedule(recorder(&log, 2), 1.5);

        scheduler.remove(cancel);
        assert!(!scheduler.is_scheduled(cancel));
        assert!(scheduler.is_scheduled(keep));

        scheduler.service(10.0);
        assert_eq!(*log.lock(), vec![(1, 10.0)]);
        assert!(scheduler.take(cancel).is_some());
    }

    #[test]
    #[should_panic(expected = "already scheduled")]
    fn test_double_submit_is_fatal() {
        let mut scheduler = TaskScheduler::new();
        let handle = scheduler.insert(Box::new(|_: f64| TaskOutcome::Done));
        scheduler.submit(handle, 1.0);
        scheduler.submit(handle, 2.0);
    }

    #[test]
    #[should_panic(expected = "remove of unscheduled")]
    fn test_remove_unscheduled_is_fatal() {
        let mut scheduler = TaskScheduler::new();
        let handle = scheduler.insert(Box::new(|_: f64| TaskOutcome::Done));
        scheduler.remove(handle);
    }

    #[test]
    fn test_retained_task_can_be_resubmitted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = TaskScheduler::new();
        let handle = scheduler.insert(recorder(&log, 7));

        scheduler.submit(handle, 1.0);
        scheduler.service(1.0);
        assert!(scheduler.contains(handle));
        assert!(!scheduler.is_scheduled(handle));

        scheduler.submit(handle, 2.0);
        scheduler.service(2.0);
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_one_shot_task_leaves_arena() {
        let mut scheduler = TaskScheduler::new();
        let handle = scheduler.schedule(Box::new(|_: f64| TaskOutcome::Done), 0.5);
        scheduler.service(1.0);
        assert!(!scheduler.contains(handle));
    }

    #[test]
    fn test_granularity_rounds_up() {
        let mut scheduler = TaskScheduler::with_granularity(0.25);
        let a = scheduler.schedule(Box::new(|_: f64| TaskOutcome::Done), 1.1);
        let b = scheduler.schedule(Box::new(|_: f64| TaskOutcome::Done), 1.5);
        let c = scheduler.schedule(Box::new(|_: f64| TaskOutcome::Done), 1.5000001);

        assert_eq!(scheduler.execute_time(a), Some(1.25));
        assert_eq!(scheduler.execute_time(b), Some(1.5));
        // Within the cutoff of a granule boundary: left alone
        assert_eq!(scheduler.execute_time(c), Some(1.5000001));
    }

    #[test]
    fn test_take_scheduled_task_unschedules_it() {
        let mut scheduler = TaskScheduler::new();
        let handle = scheduler.schedule(Box::new(|_: f64| TaskOutcome::Done), 4.0);
        assert!(scheduler.take(handle).is_some());
        assert!(scheduler.is_empty());
        assert!(scheduler.take(handle).is_none());
    }
}
