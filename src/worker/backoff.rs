//! Exponential backoff with optional full jitter, per spec.md §3's
//! `BackoffConfig`.

use std::time::Duration;

use rand::Rng;

/// How a computed delay is perturbed before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// Use the computed delay exactly.
    None,
    /// Use a value drawn uniformly from `[0, delay]`.
    Full,
}

/// `delay(n) = clamp(min * factor^n, min, max)`, perturbed by `jitter`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub min: Duration,
    pub max: Duration,
    pub factor: f64,
    pub jitter: Jitter,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: Jitter::Full,
        }
    }
}

impl BackoffConfig {
    /// The nominal (pre-jitter) delay before the `n`th restart attempt
    /// (0-indexed: the first retry after the first failure is `delay(0)`).
    pub fn delay(&self, n: u32) -> Duration {
        let scaled = self.min.as_secs_f64() * self.factor.powi(n as i32);
        let clamped = scaled.clamp(self.min.as_secs_f64(), self.max.as_secs_f64());
        Duration::from_secs_f64(clamped)
    }

    /// The actual wait to use before the `n`th restart, with jitter
    /// applied.
    pub fn next(&self, n: u32) -> Duration {
        let delay = self.delay(n);
        match self.jitter {
            Jitter::None => delay,
            Jitter::Full => {
                let upper = delay.as_secs_f64();
                if upper <= 0.0 {
                    return Duration::ZERO;
                }
                let sampled = rand::rng().random_range(0.0..=upper);
                Duration::from_secs_f64(sampled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_until_clamped() {
        let cfg = BackoffConfig {
            min: Duration::from_millis(10),
            max: Duration::from_millis(1000),
            factor: 2.0,
            jitter: Jitter::None,
        };
        assert_eq!(cfg.delay(0), Duration::from_millis(10));
        assert_eq!(cfg.delay(1), Duration::from_millis(20));
        assert_eq!(cfg.delay(2), Duration::from_millis(40));
        assert_eq!(cfg.delay(20), Duration::from_millis(1000));
    }

    #[test]
    fn full_jitter_stays_within_bounds() {
        let cfg = BackoffConfig {
            min: Duration::from_millis(10),
            max: Duration::from_millis(1000),
            factor: 2.0,
            jitter: Jitter::Full,
        };
        for n in 0..10 {
            let expected_max = cfg.delay(n);
            for _ in 0..50 {
                let actual = cfg.next(n);
                assert!(actual <= expected_max);
            }
        }
    }
}
