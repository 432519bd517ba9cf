//! Stochastic inter-request timing
//!
//! Produces human-looking delays between page visits: a uniform base with
//! occasional long "reading" pauses and quick "scanning" clicks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use rand::Rng;
use tokio::time::Instant;

/// Probability that a delay becomes a long reading pause.
pub const P_LONG_PAUSE: f64 = 0.10;
/// Scale range applied to a long reading pause.
pub const LONG_PAUSE_FACTOR: (f64, f64) = (2.0, 5.0);
/// Probability that a delay becomes a quick scan, when it is not a long pause.
pub const P_QUICK_SCAN: f64 = 0.05;
/// Scale applied to a quick scan.
pub const QUICK_SCAN_FACTOR: f64 = 0.5;
/// Cancellation check granularity inside a sleep.
pub const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Inter-request delay sampler.
///
/// Bounds come from the config; the randomness comes from the calling
/// session's private generator so sessions stay independent.
#[derive(Debug, Clone, Copy)]
pub struct TimingModel {
    min_sleep: f64,
    max_sleep: f64,
}

impl TimingModel {
    /// Create a model with the given bounds in seconds (min <= max).
    pub fn new(min_sleep: f64, max_sleep: f64) -> Self {
        Self {
            min_sleep,
            max_sleep,
        }
    }

    /// Sample the next delay.
    ///
    /// Base duration is uniform in `[min_sleep, max_sleep]`. Independently
    /// on each call: 10% of delays are scaled by a uniform factor in
    /// `[2, 5]` (reading an article, distraction), otherwise 5% are scaled
    /// by `0.5` (quickly scanning pages).
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        let mut secs = if self.max_sleep > self.min_sleep {
            rng.gen_range(self.min_sleep..=self.max_sleep)
        } else {
            self.min_sleep
        };

        if rng.gen::<f64>() < P_LONG_PAUSE {
            secs *= rng.gen_range(LONG_PAUSE_FACTOR.0..=LONG_PAUSE_FACTOR.1);
        } else if rng.gen::<f64>() < P_QUICK_SCAN {
            secs *= QUICK_SCAN_FACTOR;
        }

        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Sleep for `total`, waking every [`SLEEP_SLICE`] to observe the cancel
/// flag and the optional deadline.
///
/// Returns `true` if the full duration elapsed, `false` if the wait was
/// interrupted. Keeps cancellation latency bounded even for long pauses.
pub async fn sleep_cancellable(
    total: Duration,
    cancel: &AtomicBool,
    deadline: Option<Instant>,
) -> bool {
    let end = Instant::now() + total;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return false;
        }
        let now = Instant::now();
        if now >= end {
            return true;
        }
        tokio::time::sleep(SLEEP_SLICE.min(end - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_samples_stay_within_policy_bounds() {
        let model = TimingModel::new(1.0, 2.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10_000 {
            let d = model.sample(&mut rng).as_secs_f64();
            // Quick scan can halve the base; long pause can scale it by 5.
            assert!(d >= 1.0 * QUICK_SCAN_FACTOR);
            assert!(d <= 2.0 * LONG_PAUSE_FACTOR.1);
        }
    }

    #[test]
    fn test_modifier_rates_converge() {
        // With min == max the three modes are distinguishable by value:
        // 1.0 is unmodified, 0.5 is a quick scan, [2, 5] is a long pause.
        let model = TimingModel::new(1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(2);
        let samples = 20_000;
        let mut long = 0usize;
        let mut quick = 0usize;
        for _ in 0..samples {
            let d = model.sample(&mut rng).as_secs_f64();
            if d >= 2.0 {
                long += 1;
            } else if d < 0.75 {
                quick += 1;
            }
        }
        let long_rate = long as f64 / samples as f64;
        let quick_rate = quick as f64 / samples as f64;
        assert!((0.08..=0.12).contains(&long_rate), "long rate {long_rate}");
        // Quick scans only happen when the long-pause roll missed: 0.9 * 0.05.
        assert!((0.03..=0.065).contains(&quick_rate), "quick rate {quick_rate}");
    }

    #[test]
    fn test_zero_bounds_yield_zero_delay() {
        let model = TimingModel::new(0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(model.sample(&mut rng), Duration::ZERO);
        }
    }

    #[tokio::test]
    async fn test_sleep_runs_to_completion() {
        let cancel = AtomicBool::new(false);
        let done = sleep_cancellable(Duration::from_millis(30), &cancel, None).await;
        assert!(done);
    }

    #[tokio::test]
    async fn test_sleep_observes_cancellation_quickly() {
        let cancel = AtomicBool::new(true);
        let start = std::time::Instant::now();
        let done = sleep_cancellable(Duration::from_secs(60), &cancel, None).await;
        assert!(!done);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sleep_observes_deadline() {
        let cancel = AtomicBool::new(false);
        let deadline = Instant::now() + Duration::from_millis(50);
        let start = std::time::Instant::now();
        let done = sleep_cancellable(Duration::from_secs(60), &cancel, Some(deadline)).await;
        assert!(!done);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
