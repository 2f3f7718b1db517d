use std::time::Duration;

use crate::rate::Rate;

/// How long a worker backs off when no goal has been published yet.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(100);

/// Compute how long to sleep before the next send so that the observed
/// window converges toward `goal_rps`.
///
/// The scheduler has no fixed-interval timer: it compares the ideal
/// wall-clock time of the next send under goal pacing
/// (`observed.count / goal_rps` after the window origin) with the time the
/// window has actually been running, self-correcting drift from variable
/// send latency.
///
/// Returns:
/// - `None` when `goal_rps` is zero (or negative/NaN): pacing is undefined,
///   the caller must withhold sending rather than flood.
/// - `Some(Duration::ZERO)` when the observed rate is at or below the goal:
///   the worker is catching up, no pacing needed.
/// - Otherwise the time until the next send is due, never negative.
pub fn convergence_delay(goal_rps: f64, observed: &Rate) -> Option<Duration> {
    if !(goal_rps > 0.0) {
        return None;
    }
    if observed.per_second() <= goal_rps {
        return Some(Duration::ZERO);
    }
    let next_due = observed.count() / goal_rps;
    let delay = next_due - observed.window().as_secs_f64();
    Some(Duration::from_secs_f64(delay.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A window that ran for `secs` seconds and counted `count` sends.
    fn window(count: u64, secs: f64) -> Rate {
        Rate::closed(count, Duration::from_secs_f64(secs))
    }

    #[test]
    fn zero_goal_withholds() {
        assert_eq!(convergence_delay(0.0, &window(10, 1.0)), None);
        assert_eq!(convergence_delay(-1.0, &window(10, 1.0)), None);
        assert_eq!(convergence_delay(f64::NAN, &window(10, 1.0)), None);
    }

    #[test]
    fn behind_goal_means_no_sleep() {
        // 50/s observed against a 100/s goal: catching up.
        let d = convergence_delay(100.0, &window(50, 1.0));
        assert_eq!(d, Some(Duration::ZERO));
        // Exactly at goal also sleeps zero.
        let d = convergence_delay(100.0, &window(100, 1.0));
        assert_eq!(d, Some(Duration::ZERO));
    }

    #[test]
    fn ahead_of_goal_sleeps_until_next_send_is_due() {
        // 100 sends in 0.5s against a 100/s goal: the 101st send is due at
        // t=1.0s, so sleep the remaining 0.5s.
        let d = convergence_delay(100.0, &window(100, 0.5)).unwrap();
        assert!((d.as_secs_f64() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn never_negative() {
        for count in [0u64, 1, 10, 100, 1000] {
            for secs in [0.0, 0.001, 0.5, 1.0, 10.0] {
                for goal in [0.1, 1.0, 100.0, 10_000.0] {
                    let d = convergence_delay(goal, &window(count, secs))
                        .unwrap();
                    assert!(d >= Duration::ZERO, "count={count} secs={secs} goal={goal}");
                }
            }
        }
    }

    #[test]
    fn fresh_window_sleeps_the_full_ideal_interval() {
        // One send, no time elapsed: observed rate is infinite, the second
        // send is due one ideal interval after the origin.
        let d = convergence_delay(100.0, &window(1, 0.0)).unwrap();
        assert!((d.as_secs_f64() - 0.01).abs() < 1e-9);
    }
}
