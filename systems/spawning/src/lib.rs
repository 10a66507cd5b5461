#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Fixed-period drain timer that turns queued gifts into spawn requests.

use std::time::Duration;

use galton_board_core::{Command, Event};
use tracing::debug;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    drain_period: Duration,
}

impl Config {
    /// Creates a new configuration using the provided drain cadence.
    #[must_use]
    pub const fn new(drain_period: Duration) -> Self {
        Self { drain_period }
    }
}

/// Pure system that emits one drain request per elapsed drain period.
#[derive(Debug)]
pub struct Spawning {
    drain_period: Duration,
    accumulator: Duration,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            drain_period: config.drain_period,
            accumulator: Duration::ZERO,
        }
    }

    /// Consumes events and the pending queue length to emit drain commands.
    ///
    /// The timer keeps its cadence while the queue is empty, but drains are
    /// only requested when at least one gift is pending. At most one drain is
    /// emitted per call; periods missed during a long frame are skipped.
    pub fn handle(&mut self, events: &[Event], pending_gifts: usize, out: &mut Vec<Command>) {
        let mut accumulated = Duration::ZERO;
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                accumulated = accumulated.saturating_add(*dt);
            }
        }

        if accumulated.is_zero() {
            return;
        }

        self.accumulator = self.accumulator.saturating_add(accumulated);
        if self.resolve_drain_due() && pending_gifts > 0 {
            out.push(Command::DrainGiftQueue);
        }
    }

    fn resolve_drain_due(&mut self) -> bool {
        if self.drain_period.is_zero() || self.accumulator < self.drain_period {
            return false;
        }

        let periods = self.accumulator.as_nanos() / self.drain_period.as_nanos();
        let remainder = self.accumulator.as_nanos() % self.drain_period.as_nanos();
        if periods > 1 {
            debug!(skipped = %(periods - 1), "drain timer skipped missed periods");
        }
        self.accumulator = Duration::from_nanos(u64::try_from(remainder).unwrap_or(u64::MAX));
        true
    }
}
