//! The scheduler: owns the clock, the process table and the kernel state,
//! and drives delta cycles.
//!
//! Each timestamp is processed as a series of delta cycles:
//!
//! 1. **evaluate**: every runnable process resumes, in registration order,
//!    until its next wait;
//! 2. **update**: buffered signal writes are committed, and every signal
//!    whose value changed gets its change event notified for the next delta;
//! 3. **delta-notify**: events pending for the next delta fire, and the
//!    processes they wake become runnable in that next delta.
//!
//! When a delta cycle leaves nothing runnable, time jumps to the earliest
//! queued wake-up. The loop is synchronous and single-threaded, so the
//! same configuration always produces the same schedule.

use tracing::{debug, trace, warn};

use crate::clock::SimulationClock;
use crate::config::SchedulerConfig;
use crate::context::{KernelState, ProcessContext};
use crate::error::{KernelError, KernelResult};
use crate::event::{EventId, Merge, Notify};
use crate::process::{Blocked, Deadline, Process, ProcessId, ProcessSlot, ProcessState, Wait};
use crate::queue::{WakeTarget, Wakeup};
use crate::signal::{Channel, Signal, SignalValue};
use crate::time::{Duration, SimStamp, SimTime};
use crate::trace::{Trace, TraceEntry};

// ── Run outcome ───────────────────────────────────────────────────────

/// Why a call to [`Scheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum RunStatus {
    /// Nothing is runnable and no timed wake-up is pending: the simulation
    /// ran out of work before the time limit.
    Quiescent,
    /// The next pending wake-up lies after the time limit. The clock stands
    /// at the limit.
    TimeLimit,
}

/// Summary of one call to [`Scheduler::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Clock position when `run` returned.
    pub stamp: SimStamp,
    /// Process resumptions during this call.
    pub resumptions: u64,
    /// Delta cycles completed during this call.
    pub delta_cycles: u64,
}

// ── Scheduler ─────────────────────────────────────────────────────────

/// Top-level simulation driver.
///
/// # Example
/// ```rust
/// use deltasim::{KernelResult, ProcessContext, RunStatus, Scheduler, SimTime, Duration, Wait};
///
/// let mut sched = Scheduler::new();
/// let bus = sched.signal("bus", 0u32);
///
/// let mut sent = false;
/// sched
///     .register("writer", move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
///         if sent {
///             return Ok(Wait::Never);
///         }
///         sent = true;
///         ctx.write(&bus, 7);
///         Ok(Wait::Time(Duration::NS))
///     })
///     .unwrap();
///
/// let outcome = sched.run(SimTime::from_ticks(10_000)).unwrap();
/// assert_eq!(outcome.status, RunStatus::Quiescent);
/// assert_eq!(sched.read(&bus), 7);
/// ```
pub struct Scheduler {
    kernel: KernelState,
    processes: Vec<ProcessSlot>,
    config: SchedulerConfig,
    trace: Trace,
    started: bool,
    terminated: bool,
}

impl Scheduler {
    /// A scheduler with the default configuration, at time zero.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Scheduler {
            kernel: KernelState::default(),
            processes: Vec::new(),
            config,
            trace: Trace::new(),
            started: false,
            terminated: false,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // ── Declaration ───────────────────────────────────────────

    /// Declare a standalone event.
    pub fn event(&mut self, name: impl Into<String>) -> EventId {
        self.kernel.declare_event(name)
    }

    /// Declare a signal holding `initial`.
    pub fn signal<T: SignalValue>(&mut self, name: &str, initial: T) -> Signal<T> {
        self.kernel.declare_signal(name, initial)
    }

    /// Register a process that first runs at delta 0 of the first `run`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        body: impl Process + 'static,
    ) -> KernelResult<ProcessId> {
        self.add_process(name.into(), Box::new(body))
    }

    /// Register a process that does not run until `initial` is satisfied.
    pub fn register_waiting(
        &mut self,
        name: impl Into<String>,
        body: impl Process + 'static,
        initial: Wait,
    ) -> KernelResult<ProcessId> {
        initial.validate()?;
        let id = self.add_process(name.into(), Box::new(body))?;
        install_wait(&mut self.kernel, &mut self.processes[id.index()], id, initial)?;
        Ok(id)
    }

    fn add_process(&mut self, name: String, body: Box<dyn Process>) -> KernelResult<ProcessId> {
        if self.started {
            return Err(KernelError::RegistrationClosed { name });
        }
        if self.processes.iter().any(|p| p.name == name) {
            return Err(KernelError::DuplicateProcess { name });
        }
        let id = ProcessId::new(self.processes.len());
        debug!(%id, name = %name, "registered process");
        self.processes.push(ProcessSlot::new(name, body));
        Ok(id)
    }

    // ── Inspection and external stimulus ──────────────────────

    /// Current `(time, delta)`.
    pub fn now(&self) -> SimStamp {
        self.kernel.clock.now()
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.kernel.clock
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn process_name(&self, id: ProcessId) -> Option<&str> {
        self.processes.get(id.index()).map(|p| p.name.as_str())
    }

    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        self.processes.get(id.index()).map(|p| p.state)
    }

    /// How many times the process has been resumed.
    pub fn resumptions(&self, id: ProcessId) -> Option<u64> {
        self.processes.get(id.index()).map(|p| p.resumptions)
    }

    pub fn event_name(&self, event: EventId) -> &str {
        self.kernel.event(event).name()
    }

    /// Stamp of the pending notification of `event`, if any.
    pub fn pending(&self, event: EventId) -> Option<SimStamp> {
        self.kernel.event(event).pending()
    }

    pub fn fire_count(&self, event: EventId) -> u64 {
        self.kernel.event(event).fire_count()
    }

    /// Committed value of `signal`.
    pub fn read<T: SignalValue>(&self, signal: &Signal<T>) -> T {
        self.kernel.cell(signal).read().clone()
    }

    /// Testbench write from outside any process; committed in the next
    /// update phase.
    pub fn write<T: SignalValue>(&mut self, signal: &Signal<T>, value: T) {
        self.kernel.write(signal, value);
    }

    /// `true` if `signal` changed in the update phase right before the
    /// current delta.
    pub fn changed<T: SignalValue>(&self, signal: &Signal<T>) -> bool {
        self.kernel.cell(signal).changed_at(self.now())
    }

    /// Delta at which `signal` last took a new value, if it ever did.
    pub fn last_update_delta<T: SignalValue>(&self, signal: &Signal<T>) -> Option<u64> {
        self.kernel.cell(signal).last_change().map(|s| s.delta)
    }

    /// Testbench notification from outside any process.
    pub fn notify(&mut self, event: EventId, how: Notify) -> KernelResult<Merge> {
        self.kernel.notify(event, how)
    }

    pub fn cancel(&mut self, event: EventId) -> bool {
        self.kernel.cancel(event).is_some()
    }

    // ── Running ───────────────────────────────────────────────

    /// Run until nothing is left to do or the next wake-up lies after
    /// `until`.
    ///
    /// May be called again with a later limit to continue. Errors returned
    /// by process bodies abort the run and are passed through.
    pub fn run(&mut self, until: SimTime) -> KernelResult<RunOutcome> {
        if self.terminated {
            return Err(KernelError::Terminated);
        }
        self.started = true;

        let start_resumptions = self.total_resumptions();
        let start_deltas = self.kernel.clock.total_deltas();
        debug!(now = %self.now(), %until, processes = self.processes.len(), "run");

        let status = loop {
            if self.now().time > until {
                break RunStatus::TimeLimit;
            }
            while self.has_delta_work() {
                self.delta_cycle()?;
            }
            match self.next_wakeup() {
                None => break RunStatus::Quiescent,
                Some(next) if next > until => {
                    if until > self.now().time {
                        self.kernel.clock.advance_to(until);
                    }
                    break RunStatus::TimeLimit;
                }
                Some(next) => self.advance_to(next),
            }
        };

        let outcome = RunOutcome {
            status,
            stamp: self.now(),
            resumptions: self.total_resumptions() - start_resumptions,
            delta_cycles: self.kernel.clock.total_deltas() - start_deltas,
        };
        debug!(?outcome, "run finished");
        Ok(outcome)
    }

    /// End the simulation. Every process becomes `Terminated` and further
    /// calls to `run` fail.
    pub fn terminate(&mut self) {
        for p in &mut self.processes {
            p.state = ProcessState::Terminated;
            p.blocked = Blocked::Nothing;
        }
        self.terminated = true;
        debug!(now = %self.now(), "terminated");
    }

    fn total_resumptions(&self) -> u64 {
        self.processes.iter().map(|p| p.resumptions).sum()
    }

    fn has_delta_work(&self) -> bool {
        !self.kernel.dirty.is_empty()
            || !self.kernel.delta_events.is_empty()
            || self.processes.iter().any(|p| {
                p.state == ProcessState::Runnable
                    || p.blocked == Blocked::NextDelta
                    || matches!(p.blocked, Blocked::Events { timeout: Some(Deadline::NextDelta), .. })
            })
    }

    /// Time of the earliest queued wake-up that would still act on
    /// something. Stale entries in front of it are dropped.
    fn next_wakeup(&mut self) -> Option<SimTime> {
        while let Some(wakeup) = self.kernel.queue.peek().copied() {
            if self.is_live(&wakeup) {
                return Some(wakeup.at);
            }
            self.kernel.queue.pop();
        }
        None
    }

    fn is_live(&self, wakeup: &Wakeup) -> bool {
        match wakeup.target {
            WakeTarget::Event(event) => {
                self.kernel.event(event).pending() == Some(SimStamp::new(wakeup.at, 0))
            }
            WakeTarget::Process { id, epoch } => self
                .processes
                .get(id.index())
                .is_some_and(|p| p.state == ProcessState::Waiting && p.epoch == epoch),
        }
    }

    /// One evaluate/update/delta-notify round at the current stamp.
    fn delta_cycle(&mut self) -> KernelResult<()> {
        let now = self.now();
        trace!(%now, "delta cycle");

        self.evaluate(now)?;
        let next = now.next_delta();
        self.update(next);
        self.notify_delta(next);

        if self.processes.iter().any(|p| p.state == ProcessState::Runnable) {
            if let Some(limit) = self.config.max_deltas_per_timestamp {
                if next.delta >= limit {
                    warn!(time = %now.time, limit, "delta cycle limit exceeded");
                    return Err(KernelError::DeltaLimitExceeded {
                        time: now.time,
                        limit,
                    });
                }
            }
            self.kernel.clock.advance_delta();
        }
        Ok(())
    }

    fn evaluate(&mut self, now: SimStamp) -> KernelResult<()> {
        for index in 0..self.processes.len() {
            if self.processes[index].state != ProcessState::Runnable {
                continue;
            }
            let id = ProcessId::new(index);
            let slot = &mut self.processes[index];
            slot.state = ProcessState::Running;
            slot.resumptions += 1;
            if self.config.record_trace {
                self.trace.record(TraceEntry {
                    stamp: now,
                    process: id,
                    timed_out: slot.timed_out,
                });
            }
            trace!(%now, process = %slot.name, "resume");

            let mut ctx = ProcessContext {
                kernel: &mut self.kernel,
                process: id,
                name: &slot.name,
                timed_out: slot.timed_out,
            };
            let suspended = slot
                .body
                .resume(&mut ctx)
                .and_then(|wait| wait.validate().map(|()| wait))
                .and_then(|wait| install_wait(&mut self.kernel, slot, id, wait));
            if let Err(err) = suspended {
                slot.state = ProcessState::Terminated;
                slot.blocked = Blocked::Nothing;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Commit buffered writes. Changes become visible at `visible_at`, and
    /// their change events are pending for that same delta.
    fn update(&mut self, visible_at: SimStamp) {
        let dirty = std::mem::take(&mut self.kernel.dirty);
        for index in dirty {
            let channel = &mut self.kernel.signals[index];
            if !channel.update(visible_at) {
                continue;
            }
            let change = channel.change_event();
            trace!(signal = channel.name(), %visible_at, "signal changed");
            self.kernel.request(change, visible_at);
        }
    }

    /// Fire events pending at `next` and wake delta waiters.
    fn notify_delta(&mut self, next: SimStamp) {
        let events = std::mem::take(&mut self.kernel.delta_events);
        for event in events {
            self.fire(event, next);
        }
        for p in &mut self.processes {
            if p.state != ProcessState::Waiting {
                continue;
            }
            match p.blocked {
                Blocked::NextDelta => p.wake(false),
                Blocked::Events {
                    timeout: Some(Deadline::NextDelta),
                    ..
                } => p.wake(true),
                _ => {}
            }
        }
    }

    /// Fire `event` if its pending notification is due at `at`, waking its
    /// waiters.
    fn fire(&mut self, event: EventId, at: SimStamp) {
        let Some(slot) = self.kernel.events.get_mut(event.index()) else {
            return;
        };
        if !slot.fire_if_due(at) {
            return;
        }
        trace!(%event, name = slot.name(), %at, "fire");
        for p in &mut self.processes {
            p.on_event(event);
        }
    }

    /// Jump to `time` and process the wake-ups queued for it.
    fn advance_to(&mut self, time: SimTime) {
        self.kernel.clock.advance_to(time);
        let at = SimStamp::new(time, 0);
        for wakeup in self.kernel.queue.pop_due(time) {
            match wakeup.target {
                WakeTarget::Event(event) => self.fire(event, at),
                WakeTarget::Process { id, epoch } => {
                    let Some(p) = self.processes.get_mut(id.index()) else {
                        continue;
                    };
                    if p.state != ProcessState::Waiting || p.epoch != epoch {
                        continue;
                    }
                    let timed_out = matches!(p.blocked, Blocked::Events { .. });
                    p.wake(timed_out);
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Suspend `slot` on `wait`.
fn install_wait(
    kernel: &mut KernelState,
    slot: &mut ProcessSlot,
    id: ProcessId,
    wait: Wait,
) -> KernelResult<()> {
    let now = kernel.clock.now();
    let queue_at = |d: Duration| {
        now.time
            .checked_add(d)
            .ok_or(KernelError::TimeOverflow { now: now.time, delta: d })
    };

    slot.state = ProcessState::Waiting;
    slot.blocked = match wait {
        Wait::Delta => Blocked::NextDelta,
        Wait::Time(d) if d.is_zero() => Blocked::NextDelta,
        Wait::Time(d) => {
            kernel.queue.push(queue_at(d)?, WakeTarget::Process { id, epoch: slot.epoch });
            Blocked::Timer
        }
        Wait::Event(event) => Blocked::Events {
            remaining: vec![event],
            all: false,
            timeout: None,
        },
        Wait::AnyOf(remaining) => Blocked::Events {
            remaining,
            all: false,
            timeout: None,
        },
        Wait::AllOf(mut remaining) => {
            remaining.sort_unstable();
            remaining.dedup();
            Blocked::Events {
                remaining,
                all: true,
                timeout: None,
            }
        }
        Wait::AnyOfTimeout(remaining, d) if d.is_zero() => Blocked::Events {
            remaining,
            all: false,
            timeout: Some(Deadline::NextDelta),
        },
        Wait::AnyOfTimeout(remaining, d) => {
            kernel.queue.push(queue_at(d)?, WakeTarget::Process { id, epoch: slot.epoch });
            Blocked::Events {
                remaining,
                all: false,
                timeout: Some(Deadline::Queued),
            }
        }
        Wait::Never => Blocked::Forever,
    };
    trace!(%now, %id, blocked = ?slot.blocked, "suspend");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tracing_test::traced_test;

    use super::*;

    type Log = Rc<RefCell<Vec<(String, SimStamp)>>>;

    fn at(ps: u64, delta: u64) -> SimStamp {
        SimStamp::new(SimTime::from_ticks(ps), delta)
    }

    fn ps(n: u64) -> Duration {
        Duration::from_ticks(n)
    }

    /// A process that records every resumption and then waits on `wait`.
    fn recorder(log: &Log, tag: &str, wait: Wait) -> impl Process + 'static {
        let log = Rc::clone(log);
        let tag = tag.to_string();
        move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
            log.borrow_mut().push((tag.clone(), ctx.stamp()));
            Ok(wait.clone())
        }
    }

    #[test]
    fn test_processes_run_in_registration_order() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        for tag in ["c", "a", "b"] {
            sched.register(tag, recorder(&log, tag, Wait::Never)).unwrap();
        }

        let outcome = sched.run(SimTime::from_ticks(100)).unwrap();
        assert_eq!(outcome.status, RunStatus::Quiescent);
        assert_eq!(outcome.resumptions, 3);
        let tags: Vec<String> = log.borrow().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(tags, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_signal_write_seen_one_delta_later() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sched = Scheduler::new();
        let bus = sched.signal("bus", 0u8);

        let mut written = false;
        sched
            .register("writer", move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                if !written {
                    written = true;
                    ctx.write(&bus, 5);
                    assert_eq!(ctx.read(&bus), 0);
                }
                Ok(Wait::Never)
            })
            .unwrap();
        let sink = Rc::clone(&seen);
        sched
            .register_waiting(
                "reader",
                move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                    sink.borrow_mut().push((ctx.stamp(), ctx.read(&bus), ctx.changed(&bus)));
                    Ok(Wait::Never)
                },
                Wait::Event(bus.change_event()),
            )
            .unwrap();

        sched.run(SimTime::from_ticks(100)).unwrap();
        assert_eq!(*seen.borrow(), vec![(at(0, 1), 5, true)]);
        assert_eq!(sched.last_update_delta(&bus), Some(1));
    }

    #[test]
    fn test_writing_same_value_is_not_a_change() {
        let mut sched = Scheduler::new();
        let bus = sched.signal("bus", 3u8);
        let change = bus.change_event();
        sched.write(&bus, 3);

        sched.run(SimTime::from_ticks(10)).unwrap();
        assert_eq!(sched.fire_count(change), 0);
        assert_eq!(sched.last_update_delta(&bus), None);
    }

    #[test]
    fn test_last_write_in_delta_wins() {
        let mut sched = Scheduler::new();
        let bus = sched.signal("bus", 0u32);
        for (name, value) in [("first", 1u32), ("second", 2)] {
            sched
                .register(name, move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                    ctx.write(&bus, value);
                    Ok(Wait::Never)
                })
                .unwrap();
        }

        sched.run(SimTime::from_ticks(10)).unwrap();
        assert_eq!(sched.read(&bus), 2);
    }

    #[test]
    fn test_delta_wait_resumes_next_delta() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        let sink = Rc::clone(&log);
        let mut rounds = 0;
        sched
            .register("spin", move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                sink.borrow_mut().push(("spin".into(), ctx.stamp()));
                rounds += 1;
                Ok(if rounds < 3 { Wait::Delta } else { Wait::Never })
            })
            .unwrap();

        let outcome = sched.run(SimTime::from_ticks(10)).unwrap();
        let stamps: Vec<SimStamp> = log.borrow().iter().map(|(_, s)| *s).collect();
        assert_eq!(stamps, vec![at(0, 0), at(0, 1), at(0, 2)]);
        assert_eq!(outcome.delta_cycles, 2);
    }

    #[test]
    fn test_timed_wait_resumes_at_delta_zero() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        sched
            .register("t", recorder(&log, "t", Wait::Time(ps(250))))
            .unwrap();

        let outcome = sched.run(SimTime::from_ticks(600)).unwrap();
        let stamps: Vec<SimStamp> = log.borrow().iter().map(|(_, s)| *s).collect();
        assert_eq!(stamps, vec![at(0, 0), at(250, 0), at(500, 0)]);
        assert_eq!(outcome.status, RunStatus::TimeLimit);
        assert_eq!(sched.now(), at(600, 0));
    }

    #[test]
    fn test_run_continues_after_time_limit() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        sched
            .register("t", recorder(&log, "t", Wait::Time(ps(100))))
            .unwrap();

        sched.run(SimTime::from_ticks(150)).unwrap();
        assert_eq!(log.borrow().len(), 2);
        sched.run(SimTime::from_ticks(300)).unwrap();
        assert_eq!(log.borrow().len(), 4);
        assert_eq!(sched.now(), at(300, 0));
    }

    #[test]
    fn test_all_of_waits_for_every_event() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        let a = sched.event("a");
        let b = sched.event("b");
        sched
            .register_waiting("join", recorder(&log, "join", Wait::Never), Wait::all([a, b]).unwrap())
            .unwrap();
        sched.notify(a, Notify::After(ps(10))).unwrap();
        sched.notify(b, Notify::After(ps(30))).unwrap();

        sched.run(SimTime::from_ticks(100)).unwrap();
        assert_eq!(*log.borrow(), vec![("join".to_string(), at(30, 0))]);
    }

    #[test]
    fn test_any_of_timeout_expires() {
        let flags = Rc::new(RefCell::new(Vec::new()));
        let mut sched = Scheduler::new();
        let e = sched.event("never-notified");
        let sink = Rc::clone(&flags);
        let mut armed = false;
        sched
            .register("guard", move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                if armed {
                    sink.borrow_mut().push((ctx.stamp(), ctx.timed_out()));
                    return Ok(Wait::Never);
                }
                armed = true;
                Wait::any_or_timeout([e], ps(40))
            })
            .unwrap();

        sched.run(SimTime::from_ticks(100)).unwrap();
        assert_eq!(*flags.borrow(), vec![(at(40, 0), true)]);
    }

    #[test]
    fn test_any_of_timeout_event_first_drops_timer() {
        let flags = Rc::new(RefCell::new(Vec::new()));
        let mut sched = Scheduler::with_config(SchedulerConfig::default().with_trace());
        let e = sched.event("e");
        let sink = Rc::clone(&flags);
        let mut rounds = 0;
        let guard = sched
            .register("guard", move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                rounds += 1;
                if rounds > 1 {
                    sink.borrow_mut().push((ctx.stamp(), ctx.timed_out()));
                }
                if rounds == 2 {
                    // The stale 40 ps timeout must not cut this wait short.
                    return Ok(Wait::Event(e));
                }
                Wait::any_or_timeout([e], ps(40))
            })
            .unwrap();
        sched.notify(e, Notify::After(ps(15))).unwrap();

        sched.run(SimTime::from_ticks(100)).unwrap();
        assert_eq!(*flags.borrow(), vec![(at(15, 0), false)]);
        assert_eq!(sched.now(), at(15, 0));
        assert_eq!(sched.process_state(guard), Some(ProcessState::Waiting));
        assert_eq!(sched.trace().of(guard).count(), 2);
    }

    #[test]
    fn test_zero_timeout_expires_next_delta() {
        let flags = Rc::new(RefCell::new(Vec::new()));
        let mut sched = Scheduler::new();
        let e = sched.event("e");
        let sink = Rc::clone(&flags);
        sched
            .register_waiting(
                "guard",
                move |ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                    sink.borrow_mut().push((ctx.stamp(), ctx.timed_out()));
                    Ok(Wait::Never)
                },
                Wait::any_or_timeout([e], Duration::ZERO).unwrap(),
            )
            .unwrap();

        sched.run(SimTime::from_ticks(10)).unwrap();
        assert_eq!(*flags.borrow(), vec![(at(0, 1), true)]);
    }

    #[test]
    fn test_earlier_notification_wins() {
        let mut sched = Scheduler::new();
        let e = sched.event("e");
        assert_eq!(sched.notify(e, Notify::After(ps(1_250))).unwrap(), Merge::Scheduled);
        assert!(sched.notify(e, Notify::After(ps(750))).unwrap().accepted());
        assert!(!sched.notify(e, Notify::After(ps(900))).unwrap().accepted());
        assert_eq!(sched.pending(e), Some(at(750, 0)));

        sched.run(SimTime::from_ticks(2_000)).unwrap();
        assert_eq!(sched.fire_count(e), 1, "superseded entries are dropped");
    }

    #[test]
    fn test_cancelled_event_never_fires() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        let e = sched.event("e");
        let waiter = sched
            .register_waiting("w", recorder(&log, "w", Wait::Never), Wait::Event(e))
            .unwrap();
        sched.notify(e, Notify::After(ps(5))).unwrap();
        assert!(sched.cancel(e));

        let outcome = sched.run(SimTime::from_ticks(100)).unwrap();
        assert_eq!(outcome.status, RunStatus::Quiescent);
        assert_eq!(outcome.stamp, at(0, 0), "stale wake-ups do not move the clock");
        assert!(log.borrow().is_empty());
        assert_eq!(sched.process_state(waiter), Some(ProcessState::Waiting));
    }

    #[test]
    fn test_registration_closes_on_run() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        sched.register("p", recorder(&log, "p", Wait::Never)).unwrap();
        let err = sched.register("p", recorder(&log, "p", Wait::Never)).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateProcess { .. }));

        sched.run(SimTime::ZERO).unwrap();
        let err = sched.register("q", recorder(&log, "q", Wait::Never)).unwrap_err();
        assert_eq!(err, KernelError::RegistrationClosed { name: "q".into() });
    }

    #[test]
    fn test_empty_wait_set_fails_run() {
        let mut sched = Scheduler::new();
        let id = sched
            .register("bad", |_ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                Ok(Wait::AnyOf(Vec::new()))
            })
            .unwrap();

        let err = sched.run(SimTime::from_ticks(10)).unwrap_err();
        assert!(matches!(err, KernelError::InvalidArgument { .. }));
        assert_eq!(sched.process_state(id), Some(ProcessState::Terminated));
    }

    #[test]
    fn test_body_error_is_propagated() {
        let mut sched = Scheduler::new();
        sched
            .register("bad", |_ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                Err(KernelError::InvalidArgument {
                    what: "mode",
                    value: "7".into(),
                })
            })
            .unwrap();

        let err = sched.run(SimTime::from_ticks(10)).unwrap_err();
        assert_eq!(err.to_string(), "invalid mode: 7");
    }

    #[test]
    #[traced_test]
    fn test_zero_time_livelock_hits_delta_limit() {
        let mut sched = Scheduler::with_config(SchedulerConfig::default().with_delta_limit(16));
        sched
            .register("spin", |_ctx: &mut ProcessContext<'_>| -> KernelResult<Wait> {
                Ok(Wait::Delta)
            })
            .unwrap();

        let err = sched.run(SimTime::from_ticks(10)).unwrap_err();
        assert_eq!(
            err,
            KernelError::DeltaLimitExceeded {
                time: SimTime::ZERO,
                limit: 16,
            }
        );
        assert!(logs_contain("delta cycle limit exceeded"));
    }

    #[test]
    fn test_terminate_stops_everything() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        let id = sched
            .register("t", recorder(&log, "t", Wait::Time(ps(10))))
            .unwrap();
        sched.run(SimTime::from_ticks(25)).unwrap();

        sched.terminate();
        assert_eq!(sched.process_state(id), Some(ProcessState::Terminated));
        assert_eq!(sched.run(SimTime::from_ticks(100)), Err(KernelError::Terminated));
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_quiescent_run_keeps_clock() {
        let log: Log = Rc::default();
        let mut sched = Scheduler::new();
        sched
            .register_waiting("late", recorder(&log, "late", Wait::Never), Wait::Time(ps(70)))
            .unwrap();

        let outcome = sched.run(SimTime::from_ticks(1_000)).unwrap();
        assert_eq!(outcome.status, RunStatus::Quiescent);
        assert_eq!(outcome.stamp, at(70, 0));
        assert_eq!(sched.clock().time(), SimTime::from_ticks(70));
    }
}
