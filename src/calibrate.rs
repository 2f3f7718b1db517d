use std::time::{Duration, Instant};

use crate::client::{ClientError, ReportClient};
use crate::rate::Rate;
use crate::reporter::Reporter;
use crate::requests::ReportSynthesizer;

#[derive(Debug, Clone)]
pub struct RampUpConfig {
    /// Total wall-clock length of the ramp-up phase.
    pub duration: Duration,
    /// Lap length. One second in production; injectable so tests do not
    /// have to sleep through real laps.
    pub lap: Duration,
    /// Log per-attempt error detail (can flood the output).
    pub show_errors: bool,
}

impl Default for RampUpConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(15),
            lap: Duration::from_secs(1),
            show_errors: false,
        }
    }
}

pub struct Calibration {
    /// The final lap's rate: the unconstrained baseline throughput.
    pub baseline: Rate,
    pub errors: u64,
}

/// Discover the endpoint's unthrottled capacity.
///
/// Blocking sends in a tight loop with no self-pacing — this phase exists
/// precisely to find what the endpoint sustains. Laps are independent
/// samples: at every lap boundary the window is reported and restarted, so
/// each preliminary line reflects only the most recent lap, and the final
/// lap becomes the baseline. Failures are counted but never counted into
/// the rate; the loop's own cadence is the retry.
pub fn ramp_up<C: ReportClient + ?Sized>(
    client: &C,
    synth: &ReportSynthesizer,
    cfg: &RampUpConfig,
    reporter: &mut dyn Reporter,
) -> Calibration {
    let start = Instant::now();
    let mut lap_start = start;
    let mut rate = Rate::started();
    let mut errors = 0u64;
    let mut i = 0u64;

    loop {
        match client.submit(&synth.build(i)) {
            Ok(()) => rate.add(),
            Err(err) => {
                errors += 1;
                if cfg.show_errors {
                    log_send_error(i, &err);
                }
            }
        }
        if lap_start.elapsed() >= cfg.lap {
            rate.stop();
            if start.elapsed() >= cfg.duration {
                break;
            }
            reporter.rampup_lap(&rate, errors);
            lap_start = Instant::now();
            rate.restart();
        }
        i += 1;
    }

    reporter.rampup_done(&rate, errors);
    Calibration {
        baseline: rate,
        errors,
    }
}

/// Per-attempt error detail, split by the library's error classification.
pub(crate) fn log_send_error(i: u64, err: &ClientError) {
    if err.is_internal() {
        tracing::warn!(run = i, "internal library error: {err}");
    } else {
        let errno = err.os_error().unwrap_or(0);
        tracing::warn!(run = i, errno, "send failed: {err}");
    }
}
