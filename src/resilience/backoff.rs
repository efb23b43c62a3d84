//! Exponential backoff with jitter.

use rand::Rng;
use serde::Serialize;
use std::time::Duration;

/// Doubling delays starting at `base_ms`, capped at `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    /// Delay before retry `attempt` (1-based); zero for attempt 0.
    ///
    /// Up to 10% jitter is added on top of the capped delay, so the result
    /// may exceed `max_ms` by that much.
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = self.nominal_ms(attempt);
        let spread = capped / 10;
        let jitter = if spread > 0 {
            rand::thread_rng().gen_range(0..spread)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }

    /// Capped delay without jitter.
    pub fn nominal_ms(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        let factor = 2u64.saturating_pow(attempt - 1);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_retry_schedule() {
        // selection defaults: 1s base, 10s cap
        let backoff = Backoff::new(1000, 10_000);
        let schedule: Vec<u64> = (0..=6).map(|n| backoff.nominal_ms(n)).collect();
        assert_eq!(schedule, vec![0, 1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let backoff = Backoff::new(100, 2000);
        for _ in 0..50 {
            let d = backoff.delay(2).as_millis();
            assert!((200..220).contains(&d));
        }
        assert_eq!(backoff.delay(0), Duration::ZERO);
    }

    #[test]
    fn test_small_base_has_no_jitter() {
        assert_eq!(Backoff::new(5, 5).delay(3), Duration::from_millis(5));
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let d = Backoff::new(1000, 10_000).delay(200);
        assert!(d >= Duration::from_millis(10_000) && d < Duration::from_millis(11_000));
    }
}
