//! Binary Min-Heap with Slot Tracking
//!
//! A 1-indexed, array-backed binary heap. Slot `0` never holds an element,
//! so a slot index of `0` can be used by callers to mean "not in the heap".
//!
//! Every time an element lands in a new slot the queue tells its
//! [`MovementPolicy`]. A policy that records those slots lets the owner find
//! an arbitrary element again and cancel it with
//! [`PriorityQueue::remove_by_index`] in O(log n):
//!
//! ```text
//!   insert(x) ──► slots[n] = x ──► sift up ──► policy.set_index(.., slot)
//!   pop()     ──► swap(1, n)   ──► sift down ─► policy.set_index(x, 0)
//! ```
//!
//! The default [`NoTracking`] policy ignores all movement.

use crate::fatal;
use std::fmt;

/// Strict "less than" ordering used by the heap
pub trait Comparator<T> {
    fn less(&self, a: &T, b: &T) -> bool;
}

/// Natural `PartialOrd` ordering
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<T: PartialOrd> Comparator<T> for NaturalOrder {
    fn less(&self, a: &T, b: &T) -> bool {
        a < b
    }
}

/// Observer of element movement inside the heap.
///
/// `set_index` is called with the element's new 1-based slot whenever it
/// moves, and with `0` when it leaves the heap.
pub trait MovementPolicy<T> {
    fn set_index(&mut self, item: &T, index: usize);
}

/// Policy that does not track slots
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTracking;

impl<T> MovementPolicy<T> for NoTracking {
    fn set_index(&mut self, _item: &T, _index: usize) {}
}

/// Array-backed binary min-heap
pub struct PriorityQueue<T, C = NaturalOrder, P = NoTracking> {
    /// Element at slot `i` lives at `elements[i - 1]`
    elements: Vec<T>,
    comparator: C,
    policy: P,
}

impl<T: PartialOrd> PriorityQueue<T> {
    pub fn new() -> Self {
        Self::with_parts(NaturalOrder, NoTracking)
    }
}

impl<T: PartialOrd> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C, P> PriorityQueue<T, C, P>
where
    C: Comparator<T>,
    P: MovementPolicy<T>,
{
    /// Create a queue with an explicit comparator and movement policy
    pub fn with_parts(comparator: C, policy: P) -> Self {
        Self {
            elements: Vec::new(),
            comparator,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Smallest element, if any
    pub fn peek(&self) -> Option<&T> {
        self.elements.first()
    }

    /// Element currently held in 1-based `slot`
    pub fn get(&self, slot: usize) -> Option<&T> {
        slot.checked_sub(1).and_then(|i| self.elements.get(i))
    }

    pub fn insert(&mut self, item: T) {
        self.elements.push(item);
        let slot = self.elements.len();
        self.policy.set_index(&self.elements[slot - 1], slot);
        self.sift_up(slot);
    }

    /// Remove and return the smallest element
    pub fn pop(&mut self) -> Option<T> {
        if self.elements.is_empty() {
            return None;
        }
        Some(self.take_slot(1))
    }

    /// Remove the element in 1-based `slot`.
    ///
    /// An out-of-range slot is a protocol violation.
    pub fn remove_by_index(&mut self, slot: usize) -> T {
        if slot == 0 || slot > self.elements.len() {
            fatal!(
                "priority queue slot {} out of range (len {})",
                slot,
                self.elements.len()
            );
        }
        self.take_slot(slot)
    }

    pub fn clear(&mut self) {
        for item in self.elements.drain(..) {
            self.policy.set_index(&item, 0);
        }
    }

    /// Elements in heap order (not sorted)
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }

    fn take_slot(&mut self, slot: usize) -> T {
        let last = self.elements.len();
        if slot != last {
            self.swap(slot, last);
        }

        let item = match self.elements.pop() {
            Some(item) => item,
            None => fatal!("priority queue underflow"),
        };
        self.policy.set_index(&item, 0);

        if slot != last {
            // The element moved into `slot` can violate the heap property in
            // either direction; at most one of these does any work.
            self.sift_up(slot);
            self.sift_down(slot);
        }
        item
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.comparator
            .less(&self.elements[a - 1], &self.elements[b - 1])
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.elements.swap(a - 1, b - 1);
        self.policy.set_index(&self.elements[a - 1], a);
        self.policy.set_index(&self.elements[b - 1], b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 1 {
            let parent = slot / 2;
            if !self.less(slot, parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.elements.len();
        loop {
            let left = slot * 2;
            if left > len {
                break;
            }
            let right = left + 1;
            let child = if right <= len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, slot) {
                break;
            }
            self.swap(slot, child);
            slot = child;
        }
    }
}

impl<T: fmt::Debug, C, P> fmt::Debug for PriorityQueue<T, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("elements", &self.elements)
            .finish()
    }
}
