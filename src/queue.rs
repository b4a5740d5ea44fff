//! Deterministic queue of timed wake-ups.
//!
//! A `BinaryHeap` with reversed `Ord` on `Wakeup` acts as a min-heap keyed
//! by `(at, seq)`. Sequence numbers are strictly increasing, so wake-ups
//! at the same time pop in the order they were pushed.
//!
//! Entries are never removed early. A cancelled or superseded notification
//! leaves a stale entry behind, and the scheduler discards it by checking
//! the target's current state.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::event::EventId;
use crate::process::ProcessId;
use crate::time::SimTime;

/// What a timed wake-up acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeTarget {
    /// A timed event notification.
    Event(EventId),
    /// The timeout of a process wait. `epoch` identifies the wait it
    /// belongs to; a process that has since resumed has a newer epoch.
    Process { id: ProcessId, epoch: u64 },
}

/// One entry of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wakeup {
    pub at: SimTime,
    pub seq: u64,
    pub target: WakeTarget,
}

/// Ordering: smallest `(at, seq)` first.
impl Ord for Wakeup {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed, so the max-heap pops the smallest key.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Wakeup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default)]
pub struct WakeupQueue {
    heap: BinaryHeap<Wakeup>,
    next_seq: u64,
}

impl WakeupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: SimTime, target: WakeTarget) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Wakeup { at, seq, target });
    }

    /// The earliest entry, stale or not.
    pub fn peek(&self) -> Option<&Wakeup> {
        self.heap.peek()
    }

    pub fn pop(&mut self) -> Option<Wakeup> {
        self.heap.pop()
    }

    /// Pop every entry scheduled at exactly `at`, in push order.
    pub fn pop_due(&mut self, at: SimTime) -> Vec<Wakeup> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|w| w.at == at) {
            if let Some(w) = self.heap.pop() {
                due.push(w);
            }
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
