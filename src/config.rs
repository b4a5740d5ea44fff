//! Scheduler configuration.

/// Default cap on delta cycles at a single timestamp.
pub const DEFAULT_MAX_DELTAS: u64 = 100_000;

/// Knobs for a [`Scheduler`](crate::Scheduler).
///
/// # Example
/// ```rust
/// use deltasim::{Scheduler, SchedulerConfig};
///
/// let sched = Scheduler::with_config(
///     SchedulerConfig::default()
///         .with_delta_limit(64)
///         .with_trace(),
/// );
/// assert!(sched.config().record_trace);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delta cycles allowed at one timestamp before `run` fails with
    /// `DeltaLimitExceeded`. `None` disables the check, and a zero-time
    /// livelock then never returns.
    pub max_deltas_per_timestamp: Option<u64>,
    /// Record every process resumption in the scheduler's trace.
    pub record_trace: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            max_deltas_per_timestamp: Some(DEFAULT_MAX_DELTAS),
            record_trace: false,
        }
    }
}

impl SchedulerConfig {
    pub fn with_delta_limit(mut self, limit: u64) -> Self {
        self.max_deltas_per_timestamp = Some(limit);
        self
    }

    pub fn without_delta_limit(mut self) -> Self {
        self.max_deltas_per_timestamp = None;
        self
    }

    pub fn with_trace(mut self) -> Self {
        self.record_trace = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.max_deltas_per_timestamp, Some(DEFAULT_MAX_DELTAS));
        assert!(!cfg.record_trace);
    }

    #[test]
    fn test_builder() {
        let cfg = SchedulerConfig::default().with_delta_limit(8).with_trace();
        assert_eq!(cfg.max_deltas_per_timestamp, Some(8));
        assert!(cfg.record_trace);
        assert_eq!(cfg.without_delta_limit().max_deltas_per_timestamp, None);
    }
}
