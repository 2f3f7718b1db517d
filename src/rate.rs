use std::fmt;
use std::time::{Duration, Instant};

/// A sampling window: a monotonic origin, a request count and, once
/// [`stop`](Rate::stop) has been called, a frozen window length.
///
/// The meter itself has no opinion about what counts: the ramp-up and burst
/// phases add successful sends only, while background workers add every
/// attempt so that failures still weigh into the pacing denominator
/// (excluding them would bias convergence into a retry storm).
#[derive(Debug, Clone, Copy)]
pub struct Rate {
    count: f64,
    origin: Instant,
    frozen: Option<Duration>,
}

impl Rate {
    /// A fresh running window starting now.
    pub fn started() -> Self {
        Self {
            count: 0.0,
            origin: Instant::now(),
            frozen: None,
        }
    }

    /// Reset to an empty running window starting now.
    pub fn restart(&mut self) {
        *self = Self::started();
    }

    /// Count one request into the window.
    pub fn add(&mut self) {
        self.count += 1.0;
    }

    /// Freeze the window length at the time elapsed since the origin.
    pub fn stop(&mut self) {
        self.frozen = Some(self.origin.elapsed());
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    /// The window length: frozen if stopped, the running elapsed time
    /// otherwise.
    pub fn window(&self) -> Duration {
        self.frozen.unwrap_or_else(|| self.origin.elapsed())
    }

    /// Requests per second over this window.
    ///
    /// A zero-length window is degenerate: the result is `0.0` for an empty
    /// window and `f64::INFINITY` for a non-empty one. Callers pacing
    /// against a window must not do so before any time has elapsed.
    pub fn per_second(&self) -> f64 {
        let secs = self.window().as_secs_f64();
        if secs == 0.0 {
            if self.count == 0.0 { 0.0 } else { f64::INFINITY }
        } else {
            self.count / secs
        }
    }

    /// Sum two windows into one aggregate: counts add, the longer window and
    /// the earlier origin win.
    ///
    /// Precondition: both windows describe (roughly) the same wall-clock
    /// interval, e.g. the per-worker windows of one lap, or a burst layered
    /// on the background window it ran within. Combining disjoint intervals
    /// yields a rate without a meaningful denominator; the meter does not
    /// check time alignment itself.
    pub fn combine(&self, other: &Rate) -> Rate {
        Rate {
            count: self.count + other.count,
            origin: self.origin.min(other.origin),
            frozen: Some(self.window().max(other.window())),
        }
    }

    /// A closed window with the given count, for tests that must not sleep.
    #[cfg(test)]
    pub(crate) fn closed(count: u64, window: Duration) -> Rate {
        let mut r = Rate::started();
        for _ in 0..count {
            r.add();
        }
        r.frozen = Some(window);
        r
    }

    /// Scale the count while keeping the window, deriving a new implied rate
    /// from a measured one. Used to turn a baseline into a fractional goal.
    pub fn scale(&self, factor: f64) -> Rate {
        Rate {
            count: self.count * factor,
            origin: self.origin,
            frozen: self.frozen,
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0} in {:.3}s = {:.1}/s",
            self.count,
            self.window().as_secs_f64(),
            self.per_second()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(count: u64, window: Duration) -> Rate {
        Rate::closed(count, window)
    }

    #[test]
    fn per_second_is_count_over_window() {
        let r = closed(300, Duration::from_secs(2));
        assert_eq!(r.per_second(), 150.0);
    }

    #[test]
    fn combine_sums_counts_commutatively() {
        let a = closed(7, Duration::from_secs(1));
        let b = closed(5, Duration::from_secs(1));
        assert_eq!(a.combine(&b).count(), 12.0);
        assert_eq!(b.combine(&a).count(), 12.0);
    }

    #[test]
    fn combine_keeps_the_longer_window() {
        let a = closed(10, Duration::from_secs(1));
        let b = closed(10, Duration::from_secs(3));
        let c = a.combine(&b);
        assert_eq!(c.window(), Duration::from_secs(3));
        // 20 requests over the 3s union.
        assert!((c.per_second() - 20.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn scale_changes_the_implied_rate_not_the_window() {
        let baseline = closed(1000, Duration::from_secs(1));
        let goal = baseline.scale(0.1);
        assert_eq!(goal.window(), Duration::from_secs(1));
        assert_eq!(goal.per_second(), 100.0);
    }

    #[test]
    fn zero_window_policy() {
        let empty = closed(0, Duration::ZERO);
        assert_eq!(empty.per_second(), 0.0);

        let nonempty = closed(3, Duration::ZERO);
        assert!(nonempty.per_second().is_infinite());
    }

    #[test]
    fn display_shape() {
        let r = closed(100, Duration::from_secs(1));
        assert_eq!(r.to_string(), "100 in 1.000s = 100.0/s");
    }
}
