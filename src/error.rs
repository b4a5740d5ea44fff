//! Structured error types for the kernel.
//!
//! All fallible public APIs return `KernelResult<T>`. Broken kernel
//! invariants (the clock moving backward, a handle used against the wrong
//! scheduler) are not represented here: those panic.

use thiserror::Error;

use crate::time::{Duration, SimTime};

/// The top-level error type of the simulation kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// A caller passed a value the kernel cannot act on, such as a negative
    /// duration or an empty event set.
    #[error("invalid {what}: {value}")]
    InvalidArgument { what: &'static str, value: String },

    /// Scheduling `delta` after `now` does not fit on the timeline.
    #[error("time overflow scheduling {delta} after {now}")]
    TimeOverflow { now: SimTime, delta: Duration },

    /// Processes can only be registered before the first `run`.
    #[error("cannot register process {name:?} after the simulation has started")]
    RegistrationClosed { name: String },

    /// Process names are unique per scheduler.
    #[error("process {name:?} is already registered")]
    DuplicateProcess { name: String },

    /// A single timestamp ran more delta cycles than the configured limit.
    #[error("exceeded {limit} delta cycles at {time}")]
    DeltaLimitExceeded { time: SimTime, limit: u64 },

    /// The simulation was terminated and cannot run again.
    #[error("simulation has been terminated")]
    Terminated,
}

/// Convenience alias for `Result<T, KernelError>`.
pub type KernelResult<T> = Result<T, KernelError>;
