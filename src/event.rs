//! Events: named wake conditions with at most one pending notification.
//!
//! The scheduler owns every event in a flat table; processes and signals
//! only hold `EventId`s. A notification is pending at a `SimStamp`, and
//! the earliest request always wins.

use std::fmt;

use crate::time::{Duration, SimStamp};

// ── Event ID ──────────────────────────────────────────────────────────

/// Handle to an event in a scheduler's event table.
///
/// IDs are handed out in declaration order, so comparing two IDs compares
/// when they were declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u32);

impl EventId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        EventId(index as u32)
    }

    /// Position in the owning scheduler's event table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Notify ────────────────────────────────────────────────────────────

/// When a notification should fire, relative to the notifying delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    /// Fire at the next delta of the current time.
    Immediate,
    /// Same as `Immediate`; reads better next to timed notifications.
    Zero,
    /// Fire at `now + duration`, delta 0. A zero duration is a delta
    /// notification.
    After(Duration),
}

// ── Event Slot ────────────────────────────────────────────────────────

/// Outcome of a notification request against a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// Nothing was pending; the request is now pending.
    Scheduled,
    /// The request was earlier than the pending one and replaced it.
    Replaced { previous: SimStamp },
    /// A notification at or before the request was already pending.
    Ignored { pending: SimStamp },
}

impl Merge {
    /// `true` if the request is now the pending notification.
    pub fn accepted(self) -> bool {
        !matches!(self, Merge::Ignored { .. })
    }
}

/// Scheduler-side state of one event.
#[derive(Debug, Clone)]
pub struct EventSlot {
    name: String,
    pending: Option<SimStamp>,
    fired: u64,
}

impl EventSlot {
    pub fn new(name: impl Into<String>) -> Self {
        EventSlot {
            name: name.into(),
            pending: None,
            fired: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stamp of the pending notification, if any.
    pub fn pending(&self) -> Option<SimStamp> {
        self.pending
    }

    /// How many times this event has fired.
    pub fn fire_count(&self) -> u64 {
        self.fired
    }

    /// Request a firing at `at`, keeping whichever of the pending and the
    /// requested stamp is earlier.
    pub fn request(&mut self, at: SimStamp) -> Merge {
        match self.pending {
            None => {
                self.pending = Some(at);
                Merge::Scheduled
            }
            Some(previous) if at < previous => {
                self.pending = Some(at);
                Merge::Replaced { previous }
            }
            Some(pending) => Merge::Ignored { pending },
        }
    }

    /// Drop the pending notification. Returns the stamp it was pending at.
    pub fn cancel(&mut self) -> Option<SimStamp> {
        self.pending.take()
    }

    /// Fire the notification pending at exactly `at`.
    ///
    /// Returns `false` (and changes nothing) when the slot is not pending at
    /// `at`, which is how stale queue entries are recognized.
    pub fn fire_if_due(&mut self, at: SimStamp) -> bool {
        if self.pending == Some(at) {
            self.pending = None;
            self.fired += 1;
            true
        } else {
            false
        }
    }
}
