//! Two-phase signals.
//!
//! A write during the evaluate phase only buffers the new value. The
//! scheduler commits it in the update phase that follows, and only then
//! does `read` observe it. If the committed value differs from the old one,
//! the signal's change event is notified for the next delta cycle.
//!
//! Several writes to one signal within a delta are not an error: the last
//! one wins, like drivers on a shared bus in the same cycle.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::event::EventId;
use crate::time::SimStamp;

/// Values a signal can carry.
pub trait SignalValue: Clone + PartialEq + fmt::Debug + 'static {}

impl<T> SignalValue for T where T: Clone + PartialEq + fmt::Debug + 'static {}

// ── Handle ────────────────────────────────────────────────────────────

/// Typed handle to a signal owned by a [`Scheduler`](crate::Scheduler).
///
/// Handles are `Copy` and only meaningful to the scheduler that created
/// them.
pub struct Signal<T> {
    index: usize,
    change: EventId,
    _value: PhantomData<fn() -> T>,
}

impl<T> Signal<T> {
    pub(crate) fn new(index: usize, change: EventId) -> Self {
        Signal {
            index,
            change,
            _value: PhantomData,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// The event notified whenever a committed write changes the value.
    pub fn change_event(&self) -> EventId {
        self.change
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("index", &self.index)
            .field("change", &self.change)
            .finish()
    }
}

// ── Storage ───────────────────────────────────────────────────────────

/// Type-erased view of a signal, as the scheduler's update phase sees it.
pub(crate) trait Channel {
    fn name(&self) -> &str;

    fn change_event(&self) -> EventId;

    /// Commit the buffered write, if any. Returns `true` if the value
    /// changed, in which case the change is recorded as visible at
    /// `visible_at`.
    fn update(&mut self, visible_at: SimStamp) -> bool;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Storage behind a `Signal<T>`.
#[derive(Debug, Clone)]
pub(crate) struct SignalCell<T> {
    name: String,
    value: T,
    pending: Option<T>,
    change: EventId,
    last_change: Option<SimStamp>,
}

impl<T: SignalValue> SignalCell<T> {
    pub fn new(name: impl Into<String>, initial: T, change: EventId) -> Self {
        SignalCell {
            name: name.into(),
            value: initial,
            pending: None,
            change,
            last_change: None,
        }
    }

    pub fn read(&self) -> &T {
        &self.value
    }

    /// Buffer `value` for the next update phase.
    ///
    /// Returns `true` for the first write since the last update, i.e. when
    /// the signal has to be added to the dirty set.
    pub fn write(&mut self, value: T) -> bool {
        self.pending.replace(value).is_none()
    }

    /// Stamp at which the last actual change became visible.
    pub fn last_change(&self) -> Option<SimStamp> {
        self.last_change
    }

    /// `true` if the current value was committed by the update phase that
    /// immediately preceded `now`.
    pub fn changed_at(&self, now: SimStamp) -> bool {
        self.last_change == Some(now)
    }
}

impl<T: SignalValue> Channel for SignalCell<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn change_event(&self) -> EventId {
        self.change
    }

    fn update(&mut self, visible_at: SimStamp) -> bool {
        match self.pending.take() {
            Some(next) if next != self.value => {
                self.value = next;
                self.last_change = Some(visible_at);
                true
            }
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
