//! Retry backoff helpers shared by the dead-letter queue and the notifier.

use std::time::Duration;

/// Ceiling for dead-letter retry delays, in seconds.
pub const MAX_RETRY_DELAY_SECS: u64 = 60;

/// Calculate the retry delay for an attempt: `min(2^retry_count, 60)` seconds.
pub fn retry_delay(retry_count: u32) -> Duration {
    let seconds = 1u64
        .checked_shl(retry_count)
        .map_or(MAX_RETRY_DELAY_SECS, |s| s.min(MAX_RETRY_DELAY_SECS));
    Duration::from_secs(seconds)
}

/// Apply ±10% jitter to a delay, derived from `salt` so the same entry
/// always computes the same due-time between scans.
pub fn with_jitter(delay: Duration, salt: u64) -> Duration {
    // Map salt to [-0.1, +0.1].
    let fraction = (salt % 2001) as f64 / 2000.0; // [0, 1]
    let factor = 0.9 + fraction * 0.2;
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_until_the_cap() {
        assert_eq!(retry_delay(0), Duration::from_secs(1));
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        assert_eq!(retry_delay(5), Duration::from_secs(32));
        assert_eq!(retry_delay(6), Duration::from_secs(60));
        assert_eq!(retry_delay(100), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let base = Duration::from_secs(60);
        for salt in [0u64, 1, 999, 2000, u64::MAX] {
            let jittered = with_jitter(base, salt);
            assert!(jittered >= Duration::from_secs(54));
            assert!(jittered <= Duration::from_secs(66));
        }
    }

    #[test]
    fn jitter_is_deterministic_per_salt() {
        let base = Duration::from_secs(8);
        assert_eq!(with_jitter(base, 42), with_jitter(base, 42));
    }
}
