//! Process-facing kernel API.
//!
//! `KernelState` holds everything a process body may touch: the clock, the
//! event table, the signals, the dirty set and the wake-up queue. The
//! scheduler lends it to one process at a time through a
//! [`ProcessContext`], so a body cannot reach scheduling state except
//! through the methods below.

use tracing::trace;

use crate::clock::SimulationClock;
use crate::error::{KernelError, KernelResult};
use crate::event::{EventId, EventSlot, Merge, Notify};
use crate::process::ProcessId;
use crate::queue::{WakeTarget, WakeupQueue};
use crate::signal::{Channel, Signal, SignalCell, SignalValue};
use crate::time::{Duration, SimStamp, SimTime};

// ── Shared kernel state ───────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct KernelState {
    pub clock: SimulationClock,
    pub events: Vec<EventSlot>,
    pub signals: Vec<Box<dyn Channel>>,
    /// Signals written since the last update phase, in first-write order.
    pub dirty: Vec<usize>,
    /// Events with an accepted delta notification, in request order.
    pub delta_events: Vec<EventId>,
    pub queue: WakeupQueue,
}

impl KernelState {
    pub fn declare_event(&mut self, name: impl Into<String>) -> EventId {
        let id = EventId::new(self.events.len());
        self.events.push(EventSlot::new(name));
        id
    }

    pub fn declare_signal<T: SignalValue>(&mut self, name: &str, initial: T) -> Signal<T> {
        let change = self.declare_event(format!("{name}.change"));
        let index = self.signals.len();
        self.signals
            .push(Box::new(SignalCell::new(name, initial, change)));
        Signal::new(index, change)
    }

    /// # Panics
    /// Panics if `event` was not declared on this kernel.
    pub fn event(&self, event: EventId) -> &EventSlot {
        self.events
            .get(event.index())
            .unwrap_or_else(|| panic!("{event} does not belong to this scheduler"))
    }

    fn event_mut(&mut self, event: EventId) -> &mut EventSlot {
        self.events
            .get_mut(event.index())
            .unwrap_or_else(|| panic!("{event} does not belong to this scheduler"))
    }

    /// # Panics
    /// Panics if `signal` was not created by this kernel.
    pub fn cell<T: SignalValue>(&self, signal: &Signal<T>) -> &SignalCell<T> {
        self.signals
            .get(signal.index())
            .and_then(|c| c.as_any().downcast_ref::<SignalCell<T>>())
            .unwrap_or_else(|| panic!("signal #{} does not belong to this scheduler", signal.index()))
    }

    fn cell_mut<T: SignalValue>(&mut self, signal: &Signal<T>) -> &mut SignalCell<T> {
        self.signals
            .get_mut(signal.index())
            .and_then(|c| c.as_any_mut().downcast_mut::<SignalCell<T>>())
            .unwrap_or_else(|| panic!("signal #{} does not belong to this scheduler", signal.index()))
    }

    pub fn write<T: SignalValue>(&mut self, signal: &Signal<T>, value: T) {
        let cell = self.cell_mut(signal);
        trace!(signal = cell.name(), ?value, "write");
        if cell.write(value) {
            self.dirty.push(signal.index());
        }
    }

    /// The stamp a notification made now would be pending at.
    pub fn notify_stamp(&self, how: Notify) -> KernelResult<SimStamp> {
        let now = self.clock.now();
        match how {
            Notify::Immediate | Notify::Zero => Ok(now.next_delta()),
            Notify::After(d) if d.is_zero() => Ok(now.next_delta()),
            Notify::After(d) => now
                .time
                .checked_add(d)
                .map(|t| SimStamp::new(t, 0))
                .ok_or(KernelError::TimeOverflow {
                    now: now.time,
                    delta: d,
                }),
        }
    }

    pub fn notify(&mut self, event: EventId, how: Notify) -> KernelResult<Merge> {
        let at = self.notify_stamp(how)?;
        Ok(self.request(event, at))
    }

    /// Ask for `event` to fire at `at` and, if the request wins, remember
    /// where the firing has to be picked up from.
    pub fn request(&mut self, event: EventId, at: SimStamp) -> Merge {
        let merge = self.event_mut(event).request(at);
        if merge.accepted() {
            if at.time == self.clock.time() {
                self.delta_events.push(event);
            } else {
                self.queue.push(at.time, WakeTarget::Event(event));
            }
        }
        trace!(%event, %at, ?merge, "notify");
        merge
    }

    pub fn cancel(&mut self, event: EventId) -> Option<SimStamp> {
        let dropped = self.event_mut(event).cancel();
        if let Some(at) = dropped {
            trace!(%event, %at, "cancel");
        }
        dropped
    }
}

// ── ProcessContext ────────────────────────────────────────────────────

/// What a process body sees while it runs.
///
/// Reads observe values committed by earlier update phases only; writes
/// and notifications take effect after the current evaluate phase.
pub struct ProcessContext<'a> {
    pub(crate) kernel: &'a mut KernelState,
    pub(crate) process: ProcessId,
    pub(crate) name: &'a str,
    pub(crate) timed_out: bool,
}

impl<'a> ProcessContext<'a> {
    /// Current simulated time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.kernel.clock.time()
    }

    /// Current `(time, delta)`.
    #[inline]
    pub fn stamp(&self) -> SimStamp {
        self.kernel.clock.now()
    }

    #[inline]
    pub fn delta(&self) -> u64 {
        self.kernel.clock.delta()
    }

    /// The running process.
    pub fn process(&self) -> ProcessId {
        self.process
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// `true` if this resumption was caused by the timeout of a
    /// [`Wait::AnyOfTimeout`](crate::Wait::AnyOfTimeout) rather than an event.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    // ── Signals ───────────────────────────────────────────────

    /// Committed value of `signal`.
    pub fn read<T: SignalValue>(&self, signal: &Signal<T>) -> T {
        self.kernel.cell(signal).read().clone()
    }

    /// Buffer `value` for the update phase. The last write in a delta wins.
    pub fn write<T: SignalValue>(&mut self, signal: &Signal<T>, value: T) {
        self.kernel.write(signal, value);
    }

    /// `true` if `signal` took its current value in the update phase right
    /// before this delta.
    pub fn changed<T: SignalValue>(&self, signal: &Signal<T>) -> bool {
        self.kernel.cell(signal).changed_at(self.stamp())
    }

    // ── Events ────────────────────────────────────────────────

    /// Notify `event` for the next delta cycle.
    pub fn notify_immediate(&mut self, event: EventId) -> Merge {
        let at = self.stamp().next_delta();
        self.kernel.request(event, at)
    }

    /// Alias of [`notify_immediate`](Self::notify_immediate).
    pub fn notify_zero(&mut self, event: EventId) -> Merge {
        self.notify_immediate(event)
    }

    /// Notify `event` at `now + after`, delta 0.
    pub fn notify_at(&mut self, event: EventId, after: Duration) -> KernelResult<Merge> {
        self.kernel.notify(event, Notify::After(after))
    }

    /// Drop the pending notification of `event`. Returns `true` if one was
    /// pending.
    pub fn cancel(&mut self, event: EventId) -> bool {
        self.kernel.cancel(event).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeUnit;

    fn ctx(kernel: &mut KernelState) -> ProcessContext<'_> {
        ProcessContext {
            kernel,
            process: ProcessId::new(0),
            name: "p",
            timed_out: false,
        }
    }

    #[test]
    fn test_read_sees_committed_value_only() {
        let mut kernel = KernelState::default();
        let bus = kernel.declare_signal("bus", 0i32);
        let mut c = ctx(&mut kernel);

        c.write(&bus, 1);
        assert_eq!(c.read(&bus), 0);
        c.write(&bus, 2);
        assert_eq!(c.read(&bus), 0);
        assert_eq!(kernel.dirty, vec![bus.index()], "dirty once per delta");
    }

    #[test]
    fn test_delta_notification_pending_at_next_delta() {
        let mut kernel = KernelState::default();
        let e = kernel.declare_event("e");
        let mut c = ctx(&mut kernel);

        assert_eq!(c.notify_immediate(e), Merge::Scheduled);
        assert!(!c.notify_zero(e).accepted());
        assert_eq!(kernel.event(e).pending(), Some(SimStamp::new(SimTime::ZERO, 1)));
        assert_eq!(kernel.delta_events, vec![e]);
    }

    #[test]
    fn test_timed_notification_goes_to_queue() {
        let mut kernel = KernelState::default();
        let e = kernel.declare_event("e");
        let mut c = ctx(&mut kernel);

        let d = Duration::new(1_250, TimeUnit::Ps).unwrap();
        assert!(c.notify_at(e, d).unwrap().accepted());
        let d = Duration::new(750, TimeUnit::Ps).unwrap();
        assert!(c.notify_at(e, d).unwrap().accepted());

        assert_eq!(kernel.event(e).pending(), Some(SimStamp::new(SimTime::from_ticks(750), 0)));
        assert_eq!(kernel.queue.len(), 2, "superseded entry stays behind");
        assert!(kernel.delta_events.is_empty());
    }

    #[test]
    fn test_zero_duration_is_delta_notification() {
        let mut kernel = KernelState::default();
        let e = kernel.declare_event("e");
        let mut c = ctx(&mut kernel);

        c.notify_at(e, Duration::ZERO).unwrap();
        assert_eq!(kernel.event(e).pending(), Some(SimStamp::new(SimTime::ZERO, 1)));
        assert!(kernel.queue.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut kernel = KernelState::default();
        let e = kernel.declare_event("e");
        let mut c = ctx(&mut kernel);

        c.notify_at(e, Duration::NS).unwrap();
        assert!(c.cancel(e));
        assert!(!c.cancel(e));
        assert_eq!(kernel.event(e).pending(), None);
    }

    #[test]
    fn test_overflowing_notification_rejected() {
        let mut kernel = KernelState::default();
        let e = kernel.declare_event("e");
        kernel.clock.advance_to(SimTime::from_ticks(u64::MAX - 1));
        let mut c = ctx(&mut kernel);

        let err = c.notify_at(e, Duration::NS).unwrap_err();
        assert!(matches!(err, KernelError::TimeOverflow { .. }));
    }
}
