use std::thread;
use std::time::{Duration, Instant};

use crate::calibrate::log_send_error;
use crate::client::{ClientError, ReportClient};
use crate::rate::Rate;
use crate::reporter::{BurstSummary, Reporter};
use crate::requests::ReportSynthesizer;
use crate::worker::{TargetRate, WorkerPool};

/// Bounds of one unthrottled foreground burst.
#[derive(Debug, Clone)]
pub struct BurstConfig {
    pub max_count: u64,
    pub max_duration: Duration,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            max_count: 20_000,
            max_duration: Duration::from_secs(2),
        }
    }
}

#[derive(Debug)]
pub struct BurstOutcome {
    /// Successful sends over the burst window.
    pub rate: Rate,
    /// All attempts, including the failed one that may have ended the burst.
    pub attempts: u64,
    pub error: Option<ClientError>,
}

/// Run one unthrottled burst: send as fast as the endpoint takes it, stop
/// at the first of a failed send, the attempt bound, or the wall-clock
/// bound. The stop condition is evaluated after every attempt.
pub fn run_burst<C: ReportClient + ?Sized>(
    client: &C,
    synth: &ReportSynthesizer,
    cfg: &BurstConfig,
) -> BurstOutcome {
    let mut rate = Rate::started();
    let start = Instant::now();
    let mut attempts = 0u64;

    loop {
        attempts += 1;
        let error = match client.submit(&synth.build(attempts)) {
            Ok(()) => {
                rate.add();
                None
            }
            Err(err) => Some(err),
        };
        if error.is_some() || attempts >= cfg.max_count || start.elapsed() > cfg.max_duration {
            rate.stop();
            return BurstOutcome {
                rate,
                attempts,
                error,
            };
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Settle time between publishing a new target and firing the burst.
    pub burst_wait: Duration,
    pub burst: BurstConfig,
    /// Stop after this many bursts; `None` runs until the process dies.
    pub cycles: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            burst_wait: Duration::from_secs(10),
            burst: BurstConfig::default(),
            cycles: None,
        }
    }
}

/// The main control loop.
///
/// Cycles a multiplier through tenths of the baseline: publish the new
/// per-worker background target, let the workers settle, fire an
/// unthrottled foreground burst on top, then report the burst rate,
/// per-worker rates and errors, the aggregate background rate and the
/// grand total.
pub fn run<C: ReportClient + ?Sized>(
    client: &C,
    synth: &ReportSynthesizer,
    baseline: &Rate,
    target: &TargetRate,
    pool: &WorkerPool,
    cfg: &OrchestratorConfig,
    reporter: &mut dyn Reporter,
) {
    let mut multiplier = 1u32;
    let mut cycle = 0u64;

    loop {
        if cfg.cycles.is_some_and(|max| cycle >= max) {
            break;
        }

        let fraction = f64::from(multiplier) / 10.0;
        // The total background target is `fraction` of baseline, divided
        // evenly across the workers that actually started.
        let per_worker = baseline.scale(fraction / pool.len().max(1) as f64);
        target.set(per_worker.per_second());
        reporter.target_changed(fraction, per_worker.per_second());

        thread::sleep(cfg.burst_wait);

        let outcome = run_burst(client, synth, &cfg.burst);
        if let Some(err) = &outcome.error {
            log_send_error(outcome.attempts, err);
        }

        let workers = pool.snapshot();
        let background = workers
            .iter()
            .filter_map(|w| w.rate)
            .reduce(|a, b| a.combine(&b));
        let total = match &background {
            Some(bg) => bg.combine(&outcome.rate),
            None => outcome.rate,
        };

        reporter.burst_summary(&BurstSummary {
            fraction,
            burst: outcome.rate,
            attempts: outcome.attempts,
            burst_error: outcome.error.as_ref(),
            workers,
            background,
            total,
        });

        multiplier = if multiplier == 9 { 1 } else { multiplier + 1 };
        cycle += 1;
    }
}
