use serde_json::json;

use super::{BurstSummary, Reporter, rate_value};
use crate::rate::Rate;

/// One JSON object per line on stdout, for piping into analysis tooling.
#[derive(Debug, Default)]
pub struct JsonlReporter {
    bursts: u64,
}

impl JsonlReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for JsonlReporter {
    fn rampup_lap(&mut self, lap: &Rate, errors: u64) {
        let line = json!({
            "type": "rampup_lap",
            "rate": rate_value(lap),
            "errors": errors,
        });
        println!("{line}");
    }

    fn rampup_done(&mut self, baseline: &Rate, errors: u64) {
        let line = json!({
            "type": "baseline",
            "rate": rate_value(baseline),
            "errors": errors,
        });
        println!("{line}");
    }

    fn target_changed(&mut self, fraction: f64, per_worker_rps: f64) {
        let line = json!({
            "type": "target",
            "fraction": fraction,
            "per_worker_rps": per_worker_rps,
        });
        println!("{line}");
    }

    fn burst_summary(&mut self, summary: &BurstSummary<'_>) {
        self.bursts += 1;
        let workers: Vec<_> = summary
            .workers
            .iter()
            .map(|w| {
                json!({
                    "id": w.id,
                    "rate": w.rate.as_ref().map(rate_value),
                    "errors": w.errors,
                })
            })
            .collect();
        let line = json!({
            "type": "burst",
            "fraction": summary.fraction,
            "attempts": summary.attempts,
            "burst": rate_value(&summary.burst),
            "error": summary.burst_error.map(|e| e.to_string()),
            "workers": workers,
            "background": summary.background.as_ref().map(rate_value),
            "total": rate_value(&summary.total),
        });
        println!("{line}");
    }

    fn finish(&mut self) {
        let line = json!({
            "type": "final",
            "bursts": self.bursts,
        });
        println!("{line}");
    }
}
