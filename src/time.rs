//! Simulated time.
//!
//! Time is an integer count of ticks at a fixed base resolution of one
//! picosecond. Nothing here looks at the wall clock: time advances only when
//! the scheduler moves it forward.

use std::fmt;

use crate::error::{KernelError, KernelResult};

// ── SimTime ───────────────────────────────────────────────────────────

/// An absolute point on the simulated timeline, in picoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(u64);

impl SimTime {
    /// The start of every simulation.
    pub const ZERO: SimTime = SimTime(0);

    /// Create a `SimTime` from a raw tick value.
    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        SimTime(ticks)
    }

    /// Return the raw tick value.
    #[inline]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// The time `d` after `self`, or `None` on overflow.
    #[inline]
    pub fn checked_add(self, d: Duration) -> Option<SimTime> {
        self.0.checked_add(d.0).map(SimTime)
    }

    /// The duration between `earlier` and `self`.
    /// Returns `None` if `earlier` is after `self`.
    #[inline]
    pub fn duration_since(self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ps", self.0)
    }
}

// ── Duration ──────────────────────────────────────────────────────────

/// A non-negative span of simulated time, in picoseconds.
///
/// Negative spans are unrepresentable; [`Duration::new`] rejects them with
/// [`KernelError::InvalidArgument`] at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Duration(u64);

impl Duration {
    /// Zero time: waits and notifications of this length act on the next delta.
    pub const ZERO: Duration = Duration(0);
    /// One picosecond, the base resolution.
    pub const PS: Duration = Duration(1);
    /// One nanosecond.
    pub const NS: Duration = Duration(1_000);
    /// One microsecond.
    pub const US: Duration = Duration(1_000_000);
    /// One millisecond.
    pub const MS: Duration = Duration(1_000_000_000);
    /// One second.
    pub const SEC: Duration = Duration(1_000_000_000_000);

    /// `amount` multiples of `unit`.
    ///
    /// Fails with `InvalidArgument` for a negative amount or one that does
    /// not fit in 64 bits of picoseconds.
    pub fn new(amount: i64, unit: TimeUnit) -> KernelResult<Duration> {
        let invalid = || KernelError::InvalidArgument {
            what: "duration",
            value: format!("{amount} {unit:?}"),
        };
        let ticks = u64::try_from(amount).map_err(|_| invalid())?;
        unit.span()
            .0
            .checked_mul(ticks)
            .map(Duration)
            .ok_or_else(invalid)
    }

    /// A duration of exactly `ticks` picoseconds.
    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        Duration(ticks)
    }

    /// Raw tick count.
    #[inline]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// `true` for [`Duration::ZERO`].
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ps", self.0)
    }
}

// ── TimeUnit ──────────────────────────────────────────────────────────

/// Named multiples of the base resolution, for building durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Ps,
    Ns,
    Us,
    Ms,
    Sec,
}

impl TimeUnit {
    /// The span of one unit.
    pub const fn span(self) -> Duration {
        match self {
            TimeUnit::Ps => Duration::PS,
            TimeUnit::Ns => Duration::NS,
            TimeUnit::Us => Duration::US,
            TimeUnit::Ms => Duration::MS,
            TimeUnit::Sec => Duration::SEC,
        }
    }
}

// ── SimStamp ──────────────────────────────────────────────────────────

/// A `(time, delta)` position on the timeline.
///
/// Ordered lexicographically: every delta cycle of an earlier time comes
/// before delta 0 of any later time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SimStamp {
    pub time: SimTime,
    pub delta: u64,
}

impl SimStamp {
    #[inline]
    pub const fn new(time: SimTime, delta: u64) -> Self {
        SimStamp { time, delta }
    }

    /// The next delta cycle at the same time.
    #[inline]
    pub const fn next_delta(self) -> Self {
        SimStamp {
            time: self.time,
            delta: self.delta + 1,
        }
    }
}

impl fmt::Display for SimStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+δ{}", self.time, self.delta)
    }
}
