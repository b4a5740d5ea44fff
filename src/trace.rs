//! Resumption trace.
//!
//! When enabled in [`SchedulerConfig`](crate::SchedulerConfig), the
//! scheduler appends one entry per process resumption. Two runs of the same
//! configuration must produce identical traces, and the fingerprint turns
//! that check into a single comparison.

use std::fmt;

use crate::process::ProcessId;
use crate::time::SimStamp;

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// A single process resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    /// Position on the timeline the process ran at.
    pub stamp: SimStamp,
    pub process: ProcessId,
    /// The resumption was caused by a wait timeout rather than an event.
    pub timed_out: bool,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stamp, self.process)?;
        if self.timed_out {
            write!(f, " (timeout)")?;
        }
        Ok(())
    }
}

/// Append-only list of resumptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resumptions of one process, in order.
    pub fn of(&self, process: ProcessId) -> impl Iterator<Item = &TraceEntry> + '_ {
        self.entries.iter().filter(move |e| e.process == process)
    }

    /// Order-sensitive hash of the whole trace.
    pub fn fingerprint(&self) -> u64 {
        self.entries.iter().fold(0, |h, e| {
            let h = hash_combine(h, e.stamp.time.ticks());
            let h = hash_combine(h, e.stamp.delta);
            let h = hash_combine(h, e.process.index() as u64);
            hash_combine(h, u64::from(e.timed_out))
        })
    }
}
