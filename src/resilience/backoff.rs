//! Linear backoff.

use std::time::Duration;

/// Delay to wait after failed attempt `attempt` (zero-based).
///
/// Grows linearly: `base * (attempt + 1)`.
pub fn linear_backoff(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(1000);
        assert_eq!(linear_backoff(0, base), Duration::from_millis(1000));
        assert_eq!(linear_backoff(1, base), Duration::from_millis(2000));
        assert_eq!(linear_backoff(4, base), Duration::from_millis(5000));
    }

    #[test]
    fn zero_base_never_waits() {
        assert_eq!(linear_backoff(3, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        assert_eq!(linear_backoff(u32::MAX, Duration::MAX), Duration::MAX);
    }
}
