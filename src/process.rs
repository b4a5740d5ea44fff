//! Processes and their wake conditions.
//!
//! A process is a resumable state machine. Each call to
//! [`Process::resume`] runs the body from its last suspension point up to
//! the next one and returns the [`Wait`] it suspends on. The scheduler
//! owns the process and decides when it resumes next. Between two
//! suspensions a body runs atomically with respect to every other process.

use std::fmt;

use crate::context::ProcessContext;
use crate::error::{KernelError, KernelResult};
use crate::event::EventId;
use crate::time::Duration;

// ── Process ID ────────────────────────────────────────────────────────

/// Handle to a registered process. IDs follow registration order, which is
/// also the order processes run in within a delta cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessId(u32);

impl ProcessId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        ProcessId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ── Process State ─────────────────────────────────────────────────────

/// Lifecycle of a process.
///
/// `Runnable → Running → Waiting → Runnable → … → Terminated`. Bodies
/// never terminate themselves; `Terminated` is reached when the
/// simulation is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessState {
    Runnable,
    Running,
    Waiting,
    Terminated,
}

// ── Wait ──────────────────────────────────────────────────────────────

/// The condition a process suspends on.
///
/// Built fresh at every suspension, so a process may wait on something
/// different each time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wait {
    /// Resume at `now + duration`, delta 0. A zero duration means
    /// [`Wait::Delta`].
    Time(Duration),
    /// Resume at the next delta cycle of the current time.
    Delta,
    /// Resume when the event fires.
    Event(EventId),
    /// Resume when any of the events fires.
    AnyOf(Vec<EventId>),
    /// Resume once every one of the events has fired.
    AllOf(Vec<EventId>),
    /// Resume when any of the events fires or the duration elapses,
    /// whichever comes first.
    AnyOfTimeout(Vec<EventId>, Duration),
    /// Never resume.
    Never,
}

impl Wait {
    pub fn time(duration: Duration) -> Wait {
        Wait::Time(duration)
    }

    pub fn event(event: EventId) -> Wait {
        Wait::Event(event)
    }

    /// Wake on the first of `events`. Fails on an empty set.
    pub fn any(events: impl IntoIterator<Item = EventId>) -> KernelResult<Wait> {
        non_empty(events).map(Wait::AnyOf)
    }

    /// Wake once all of `events` have fired. Fails on an empty set.
    pub fn all(events: impl IntoIterator<Item = EventId>) -> KernelResult<Wait> {
        non_empty(events).map(Wait::AllOf)
    }

    /// Wake on the first of `events`, or after `timeout`.
    pub fn any_or_timeout(
        events: impl IntoIterator<Item = EventId>,
        timeout: Duration,
    ) -> KernelResult<Wait> {
        non_empty(events).map(|events| Wait::AnyOfTimeout(events, timeout))
    }

    /// Check a condition built directly from the enum variants.
    pub(crate) fn validate(&self) -> KernelResult<()> {
        match self {
            Wait::AnyOf(events) | Wait::AllOf(events) | Wait::AnyOfTimeout(events, _)
                if events.is_empty() =>
            {
                Err(empty_set())
            }
            _ => Ok(()),
        }
    }
}

fn non_empty(events: impl IntoIterator<Item = EventId>) -> KernelResult<Vec<EventId>> {
    let mut events: Vec<EventId> = events.into_iter().collect();
    if events.is_empty() {
        return Err(empty_set());
    }
    events.sort_unstable();
    events.dedup();
    Ok(events)
}

fn empty_set() -> KernelError {
    KernelError::InvalidArgument {
        what: "event set",
        value: "[]".into(),
    }
}

// ── Process trait ─────────────────────────────────────────────────────

/// A process body.
///
/// Implementations keep their own resume point (typically an enum of
/// steps) and route every side effect through `ctx`. An `Err` aborts the
/// current `run` and is returned from it unchanged.
pub trait Process {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> KernelResult<Wait>;
}

/// A process backed by a closure, for tests and small testbenches.
impl<F> Process for F
where
    F: FnMut(&mut ProcessContext<'_>) -> KernelResult<Wait>,
{
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> KernelResult<Wait> {
        (self)(ctx)
    }
}

// ── Scheduler-side bookkeeping ────────────────────────────────────────

/// What a waiting process is blocked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Blocked {
    /// Not blocked: runnable, running or terminated.
    Nothing,
    NextDelta,
    /// Only the queued timeout for the current epoch can wake it.
    Timer,
    /// `remaining` still has to fire; with `all == false` the first one is
    /// enough.
    Events {
        remaining: Vec<EventId>,
        all: bool,
        timeout: Option<Deadline>,
    },
    Forever,
}

/// How the timeout of an event wait is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deadline {
    /// Zero-length timeout: expires in the next delta-notify phase.
    NextDelta,
    /// A `WakeTarget::Process` entry sits in the wake-up queue.
    Queued,
}

pub(crate) struct ProcessSlot {
    pub name: String,
    pub body: Box<dyn Process>,
    pub state: ProcessState,
    pub blocked: Blocked,
    /// Bumped at every wake-up, so timeouts from earlier waits go stale.
    pub epoch: u64,
    pub timed_out: bool,
    pub resumptions: u64,
}

impl ProcessSlot {
    pub fn new(name: String, body: Box<dyn Process>) -> Self {
        ProcessSlot {
            name,
            body,
            state: ProcessState::Runnable,
            blocked: Blocked::Nothing,
            epoch: 0,
            timed_out: false,
            resumptions: 0,
        }
    }

    pub fn wake(&mut self, timed_out: bool) {
        self.state = ProcessState::Runnable;
        self.blocked = Blocked::Nothing;
        self.epoch += 1;
        self.timed_out = timed_out;
    }

    /// Account for `event` firing. Returns `true` if that wakes the process.
    pub fn on_event(&mut self, event: EventId) -> bool {
        if self.state != ProcessState::Waiting {
            return false;
        }
        let wakes = match &mut self.blocked {
            Blocked::Events { remaining, all, .. } => {
                let Some(pos) = remaining.iter().position(|e| *e == event) else {
                    return false;
                };
                if *all {
                    remaining.remove(pos);
                    remaining.is_empty()
                } else {
                    true
                }
            }
            _ => false,
        };
        if wakes {
            self.wake(false);
        }
        wakes
    }
}

impl fmt::Debug for ProcessSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSlot")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("blocked", &self.blocked)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
