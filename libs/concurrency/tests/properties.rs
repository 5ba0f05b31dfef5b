//! Scheduling and Identity Property Tests
//!
//! Ordering and allocation properties that must hold for any input.

use concurrency::key_allocator::KeyAllocator;
use concurrency::priority_queue::PriorityQueue;
use concurrency::task_scheduler::TIME_GRANULARITY_FRACTION_CUTOFF;
use concurrency::{ActorKey, Subject, TaskOutcome, TaskScheduler, LOGGING_KEY, MANAGER_KEY};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn subject() -> impl Strategy<Value = Subject> {
    prop_oneof![
        Just(Subject::Logic),
        Just(Subject::NetworkConnectionManager),
        Just(Subject::NetworkConnectionSet),
        Just(Subject::Ai),
        Just(Subject::Ui),
        Just(Subject::Database),
    ]
}

fn unique_key() -> impl Strategy<Value = ActorKey> {
    (subject(), 1u16..6, 1u16..6).prop_map(|(s, major, minor)| ActorKey::new(s, major, minor))
}

fn pattern() -> impl Strategy<Value = ActorKey> {
    (
        prop_oneof![Just(None), subject().prop_map(Some)],
        0u16..6,
        0u16..6,
    )
        .prop_map(|(s, major, minor)| match s {
            Some(s) => ActorKey::new(s, major, minor),
            None => ActorKey::new(Subject::All, major, minor),
        })
}

proptest! {
    /// Property: popping yields the inserted multiset in non-decreasing order
    #[test]
    fn heap_pops_in_order(values in prop::collection::vec(any::<i32>(), 0..200)) {
        let mut queue = PriorityQueue::new();
        for value in &values {
            queue.insert(*value);
        }

        let mut popped = Vec::new();
        while let Some(value) = queue.pop() {
            popped.push(value);
        }

        let mut expected = values.clone();
        expected.sort();
        prop_assert_eq!(popped, expected);
    }

    /// Property: removing any slot leaves the same sequence as never
    /// inserting that element, and peek always sees the minimum
    #[test]
    fn heap_removal_by_slot(
        values in prop::collection::vec(-1000i32..1000, 1..100),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut queue = PriorityQueue::new();
        for value in &values {
            queue.insert(*value);
            prop_assert_eq!(queue.peek().copied(), queue.iter().copied().min());
        }

        let slot = pick.index(values.len()) + 1;
        let removed = queue.remove_by_index(slot);
        prop_assert_eq!(queue.len(), values.len() - 1);

        let mut drained = Vec::new();
        while let Some(value) = queue.pop() {
            drained.push(value);
        }

        let mut expected = values.clone();
        let position = expected.iter().position(|v| *v == removed).unwrap();
        expected.remove(position);
        expected.sort();
        prop_assert_eq!(drained, expected);
    }

    /// Property: cancelled tasks never run, the rest run in time order
    #[test]
    fn cancelled_tasks_never_run(
        times in prop::collection::vec(0.0f64..100.0, 1..60),
        cancel in prop::collection::vec(any::<bool>(), 60),
    ) {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = TaskScheduler::new();
        let mut expected = Vec::new();

        for (index, time) in times.iter().copied().enumerate() {
            let ran = Arc::clone(&ran);
            let handle = scheduler.schedule(
                Box::new(move |_: f64| {
                    ran.lock().push((time, index));
                    TaskOutcome::Done
                }),
                time,
            );
            if cancel[index] {
                scheduler.remove(handle);
                prop_assert!(!scheduler.is_scheduled(handle));
            } else {
                expected.push((time, index));
            }
        }

        scheduler.service(100.0);
        prop_assert!(scheduler.is_empty());

        let ran = ran.lock().clone();
        prop_assert_eq!(ran.len(), expected.len());
        prop_assert!(ran.windows(2).all(|pair| pair[0].0 <= pair[1].0));

        let ran_ids: BTreeSet<usize> = ran.iter().map(|(_, index)| *index).collect();
        let expected_ids: BTreeSet<usize> = expected.iter().map(|(_, index)| *index).collect();
        prop_assert_eq!(ran_ids, expected_ids);
    }

    /// Property: a task lands on granule ceil(t / g), where a time within
    /// the cutoff fraction past a boundary keeps that boundary's granule
    #[test]
    fn granularity_rounds_up_to_granule(
        granularity in 0.01f64..1.0,
        time in 0.0f64..50.0,
    ) {
        let mut scheduler = TaskScheduler::with_granularity(granularity);
        let handle = scheduler.schedule(Box::new(|_: f64| TaskOutcome::Done), time);
        let scheduled = scheduler.execute_time(handle).unwrap();

        let granule = (time / granularity - TIME_GRANULARITY_FRACTION_CUTOFF).ceil();
        let landed = scheduled / granularity;
        prop_assert_eq!(landed.round(), granule);
        prop_assert!((landed - granule).abs() <= TIME_GRANULARITY_FRACTION_CUTOFF + 1e-9);
        prop_assert!(scheduled >= time);
    }

    /// Property: a pattern matches a key exactly when every concrete
    /// component agrees
    #[test]
    fn pattern_matching_by_component(pattern in pattern(), key in unique_key()) {
        let expected = (pattern.subject_raw() == 0 || pattern.subject_raw() == key.subject_raw())
            && (pattern.major() == 0 || pattern.major() == key.major())
            && (pattern.minor() == 0 || pattern.minor() == key.minor());
        prop_assert_eq!(pattern.matches(key), expected);
        prop_assert!(!pattern.matches(MANAGER_KEY));
        prop_assert!(!pattern.matches(LOGGING_KEY));
    }

    /// Property: allocated keys are unique while live, and a released key
    /// is handed out again
    #[test]
    fn allocation_is_unique_and_recycles(
        requests in prop::collection::vec((subject(), 0u16..3), 1..40),
    ) {
        let mut allocator = KeyAllocator::new();
        let mut live = BTreeSet::new();

        for (subject, major) in requests {
            let key = allocator.fill_in(ActorKey::new(subject, major, 0));
            prop_assert!(key.is_unique());
            prop_assert!(live.insert(key), "{} allocated twice", key);
            allocator.add_tracked(key);
        }

        let released = *live.iter().next().unwrap();
        allocator.remove_tracked(released);
        prop_assert!(!allocator.is_tracked(released));

        let again = allocator.fill_in(ActorKey::new(
            released.subject().unwrap(),
            released.major(),
            0,
        ));
        prop_assert_eq!(again, released);
    }
}
