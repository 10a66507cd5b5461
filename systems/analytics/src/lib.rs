#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic analytics system that publishes one landing report per tick.

pub mod metrics;

use galton_board_core::{Event, StatsReport};
use tracing::debug;

pub use metrics::{binomial_shares, deviation_from_binomial_bps, format_leaders, mean_bin};

/// Pure analytics system that coalesces scoring events into published reports.
#[derive(Debug, Default)]
pub struct Analytics {
    last_report: Option<StatsReport>,
    pending: Option<RecomputeRequest>,
}

impl Analytics {
    /// Creates a new analytics system with no pending work.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last report published by the system, if any.
    #[must_use]
    pub fn last_report(&self) -> Option<&StatsReport> {
        self.last_report.as_ref()
    }

    /// Consumes world events to publish statistics updates.
    ///
    /// The provided `recompute` closure is invoked at most once per call and only when a
    /// landing, drop or reset is pending *and* a tick (`Event::TimeAdvanced`) has been
    /// observed.
    pub fn handle<F>(&mut self, events: &[Event], mut recompute: F, out: &mut Vec<Event>)
    where
        F: FnMut() -> Option<StatsReport>,
    {
        let mut tick_observed = false;

        for event in events {
            match event {
                Event::TokenLanded { .. } | Event::TokenDropped { .. } => {
                    self.enqueue_request(RecomputeRequest::Scored);
                }
                Event::BinHistoryReset => self.enqueue_request(RecomputeRequest::Reset),
                Event::TimeAdvanced { .. } => tick_observed = true,
                _ => {}
            }
        }

        if !tick_observed {
            return;
        }

        let Some(request) = self.pending.take() else {
            return;
        };

        if let Some(report) = recompute() {
            debug!(
                ?request,
                landed = report.landed,
                dropped = report.dropped,
                distribution = ?report.distribution,
                mean_bin = ?mean_bin(&report.distribution),
                deviation_bps = ?deviation_from_binomial_bps(&report),
                "landing statistics"
            );
            debug!("current scores:\n{}", format_leaders(&report));
            self.last_report = Some(report.clone());
            out.push(Event::StatsPublished { report });
        }
    }

    fn enqueue_request(&mut self, request: RecomputeRequest) {
        self.pending = match (self.pending, request) {
            (Some(RecomputeRequest::Reset), _) | (_, RecomputeRequest::Reset) => {
                Some(RecomputeRequest::Reset)
            }
            _ => Some(RecomputeRequest::Scored),
        };
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecomputeRequest {
    Scored,
    Reset,
}
