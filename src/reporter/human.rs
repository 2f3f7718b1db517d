use super::{BurstSummary, Reporter};
use crate::rate::Rate;

/// Console lines in the shape operators of the original tool know.
#[derive(Debug, Default)]
pub struct HumanReporter {
    bursts: u64,
}

impl HumanReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for HumanReporter {
    fn rampup_lap(&mut self, lap: &Rate, errors: u64) {
        println!("Baserate prelim {lap} errors:{errors}");
    }

    fn rampup_done(&mut self, baseline: &Rate, errors: u64) {
        println!("Baserate final  {baseline}");
        println!("{errors} errors during ramp up");
    }

    fn target_changed(&mut self, fraction: f64, per_worker_rps: f64) {
        println!("Switching bg rate to {fraction:.1} of baseline ({per_worker_rps:.1}/s per worker)");
    }

    fn burst_summary(&mut self, summary: &BurstSummary<'_>) {
        self.bursts += 1;
        println!();
        println!("Burst {} ({} attempts)", summary.burst, summary.attempts);
        if let Some(err) = summary.burst_error {
            if err.is_internal() {
                println!("Burst ended early: internal library error: {err}");
            } else {
                let errno = err.os_error().unwrap_or(0);
                println!("Burst ended early: {err} errno={errno}");
            }
        }
        for worker in &summary.workers {
            match &worker.rate {
                Some(rate) => println!("BG {} {} errors:{}", worker.id, rate, worker.errors),
                None => println!("BG {} (no full lap yet) errors:{}", worker.id, worker.errors),
            }
        }
        match &summary.background {
            Some(background) => println!("BG all {background}"),
            None => println!("BG all (no full lap yet)"),
        }
        println!("Total {}", summary.total);
    }

    fn finish(&mut self) {
        println!("done after {} bursts", self.bursts);
    }
}
