//! The simulation clock: current time plus delta-cycle index.

use crate::time::{SimStamp, SimTime};

/// Current `(time, delta)` of a simulation.
///
/// Only moves forward. `delta` counts the evaluate/update rounds run at the
/// current time and drops back to 0 whenever time advances.
#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    now: SimStamp,
    total_deltas: u64,
}

impl SimulationClock {
    /// A clock at `(0, 0)`.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> SimStamp {
        self.now
    }

    #[inline]
    pub fn time(&self) -> SimTime {
        self.now.time
    }

    #[inline]
    pub fn delta(&self) -> u64 {
        self.now.delta
    }

    /// Delta cycles completed over the whole run, across all timestamps.
    pub fn total_deltas(&self) -> u64 {
        self.total_deltas
    }

    /// Move to the next delta cycle at the current time.
    pub fn advance_delta(&mut self) {
        self.now = self.now.next_delta();
        self.total_deltas += 1;
    }

    /// Jump to `time`, delta 0.
    ///
    /// # Panics
    /// Panics if `time` is not strictly after the current time.
    pub fn advance_to(&mut self, time: SimTime) {
        assert!(
            time > self.now.time,
            "clock moved backward: now={}, requested={}",
            self.now,
            time
        );
        self.now = SimStamp::new(time, 0);
    }
}
