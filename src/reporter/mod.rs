mod human;
mod json;

pub use self::{human::HumanReporter, json::JsonlReporter};

use crate::client::ClientError;
use crate::rate::Rate;

/// Per-worker slice of a burst summary.
#[derive(Debug)]
pub struct WorkerReport {
    pub id: usize,
    /// Last full-lap window the worker published; `None` until its first
    /// lap completes.
    pub rate: Option<Rate>,
    pub errors: u64,
}

/// Everything reported at the end of one burst cycle.
#[derive(Debug)]
pub struct BurstSummary<'a> {
    /// Fraction of the baseline the background load was driven at.
    pub fraction: f64,
    pub burst: Rate,
    pub attempts: u64,
    pub burst_error: Option<&'a ClientError>,
    pub workers: Vec<WorkerReport>,
    /// Sum of all published worker windows.
    pub background: Option<Rate>,
    /// Background plus burst.
    pub total: Rate,
}

/// Consumes measurement output. Diagnostics go through `tracing`; the
/// reporter owns stdout.
pub trait Reporter: Send {
    /// A preliminary one-lap rate during ramp-up.
    fn rampup_lap(&mut self, lap: &Rate, errors: u64);
    /// The final lap of ramp-up, i.e. the established baseline.
    fn rampup_done(&mut self, baseline: &Rate, errors: u64);
    /// The orchestrator published a new background target.
    fn target_changed(&mut self, fraction: f64, per_worker_rps: f64);
    fn burst_summary(&mut self, summary: &BurstSummary<'_>);
    fn finish(&mut self);
}

pub(crate) fn rate_value(rate: &Rate) -> serde_json::Value {
    serde_json::json!({
        "count": rate.count(),
        "seconds": rate.window().as_secs_f64(),
        "per_second": rate.per_second(),
    })
}

#[cfg(test)]
pub(crate) mod capture {
    use super::*;

    #[derive(Debug)]
    pub(crate) struct CapturedBurst {
        pub(crate) fraction: f64,
        pub(crate) attempts: u64,
        pub(crate) count: f64,
        pub(crate) worker_count: usize,
        pub(crate) total_count: f64,
        pub(crate) failed: bool,
    }

    /// Records everything the harness reports, for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct CaptureReporter {
        pub(crate) laps: Vec<(f64, u64)>,
        pub(crate) baseline: Option<(f64, f64)>,
        pub(crate) targets: Vec<f64>,
        pub(crate) bursts: Vec<CapturedBurst>,
        pub(crate) finished: bool,
    }

    impl Reporter for CaptureReporter {
        fn rampup_lap(&mut self, lap: &Rate, errors: u64) {
            self.laps.push((lap.count(), errors));
        }

        fn rampup_done(&mut self, baseline: &Rate, _errors: u64) {
            self.baseline = Some((baseline.count(), baseline.window().as_secs_f64()));
        }

        fn target_changed(&mut self, fraction: f64, _per_worker_rps: f64) {
            self.targets.push(fraction);
        }

        fn burst_summary(&mut self, summary: &BurstSummary<'_>) {
            self.bursts.push(CapturedBurst {
                fraction: summary.fraction,
                attempts: summary.attempts,
                count: summary.burst.count(),
                worker_count: summary.workers.len(),
                total_count: summary.total.count(),
                failed: summary.burst_error.is_some(),
            });
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }
}
