//! Bounded exponential backoff with jitter for dialing the coordinator

use std::time::Duration;

use rand::Rng;

/// Configuration for the worker's dial retry loop
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Total dial attempts before giving up (including the first)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial: Duration,
    /// Upper bound on any single delay, before jitter
    pub max: Duration,
    /// Growth factor per retry
    pub multiplier: f64,
    /// Jitter as a fraction of the delay; 0.5 yields 50% to 150%
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial: Duration::from_millis(50),
            max: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl BackoffConfig {
    /// Delay to wait after the given failed attempt (0-based)
    pub fn delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max.as_secs_f64()).max(0.0);

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rng.random_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };
        Duration::try_from_secs_f64(capped * factor).unwrap_or(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_delay_grows_and_caps() {
        let config = BackoffConfig {
            max_attempts: 5,
            initial: Duration::from_millis(10),
            max: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(config.delay(0, &mut rng), Duration::from_millis(10));
        assert_eq!(config.delay(1, &mut rng), Duration::from_millis(20));
        assert_eq!(config.delay(2, &mut rng), Duration::from_millis(40));
        assert_eq!(config.delay(10, &mut rng), Duration::from_millis(100));
    }

    #[test]
    fn test_shrinking_multiplier_never_goes_negative() {
        let config = BackoffConfig {
            multiplier: -2.0,
            jitter: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(config.delay(1, &mut rng), Duration::ZERO);
        assert_eq!(config.delay(2, &mut rng), Duration::from_millis(200));
    }

    #[test]
    fn test_unbounded_max_falls_back_to_max() {
        let config = BackoffConfig {
            initial: Duration::MAX,
            max: Duration::MAX,
            jitter: 1.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);

        for attempt in 0..20 {
            assert!(config.delay(attempt, &mut rng) <= Duration::MAX);
        }
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let config = BackoffConfig {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter: 0.5,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let delay = config.delay(0, &mut rng);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(150));
        }
    }
}
