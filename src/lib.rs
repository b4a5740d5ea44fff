//! # deltasim: Discrete-Event Simulation Kernel
//!
//! A delta-cycle scheduler for hardware-style models: processes
//! communicating over two-phase signals and events on a picosecond
//! timeline. No async, no threads, no wall-clock time. Processes are
//! resumable state machines and the scheduler decides when each one runs,
//! so the same configuration always yields the same schedule.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          Scheduler            │ ← evaluate / update / delta-notify
//! │  ┌────────────────────────┐  │
//! │  │   Processes            │  │ ← resumable bodies + wait conditions
//! │  └────────────────────────┘  │
//! │  ┌────────────────────────┐  │
//! │  │   KernelState          │  │ ← lent to a body as ProcessContext
//! │  │  ┌──────────────────┐  │  │
//! │  │  │ Signals          │  │  │ ← committed value + pending write
//! │  │  ├──────────────────┤  │  │
//! │  │  │ Events           │  │  │ ← at most one pending notification
//! │  │  ├──────────────────┤  │  │
//! │  │  │ WakeupQueue      │  │  │ ← timed wake-ups, min-heap
//! │  │  ├──────────────────┤  │  │
//! │  │  │ SimulationClock  │  │  │ ← (time, delta)
//! │  │  └──────────────────┘  │  │
//! │  └────────────────────────┘  │
//! └──────────────────────────────┘
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod process;
mod queue;
pub mod scheduler;
pub mod signal;
pub mod time;
pub mod trace;

// Re-exports for convenience.
pub use clock::SimulationClock;
pub use config::SchedulerConfig;
pub use context::ProcessContext;
pub use error::{KernelError, KernelResult};
pub use event::{EventId, Merge, Notify};
pub use process::{Process, ProcessId, ProcessState, Wait};
pub use scheduler::{RunOutcome, RunStatus, Scheduler};
pub use signal::{Signal, SignalValue};
pub use time::{Duration, SimStamp, SimTime, TimeUnit};
pub use trace::{Trace, TraceEntry};
