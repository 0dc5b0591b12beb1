//! Wilson score interval
//!
//! Confidence intervals for proportions. The Wilson interval stays inside
//! [0,1] at low sample sizes where the naive normal approximation produces
//! invalid bounds. The z-score for the chosen level is a fixed lookup, not
//! an inverse-CDF approximation, so output is deterministic and testable.

/// Supported confidence levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    P90,
    P95,
    P99,
}

impl ConfidenceLevel {
    /// Two-sided z-score for the level
    pub fn z(&self) -> f64 {
        match self {
            ConfidenceLevel::P90 => 1.6449,
            ConfidenceLevel::P95 => 1.9600,
            ConfidenceLevel::P99 => 2.5758,
        }
    }

    /// Parse a percent value (90/95/99); anything else is None
    pub fn from_percent(percent: i64) -> Option<ConfidenceLevel> {
        match percent {
            90 => Some(ConfidenceLevel::P90),
            95 => Some(ConfidenceLevel::P95),
            99 => Some(ConfidenceLevel::P99),
            _ => None,
        }
    }
}

/// Wilson score interval for `successes` out of `trials`
///
/// Returns `(lo, hi)` with `0 <= lo <= p <= hi <= 1`. Zero trials yield
/// `(0.0, 0.0)`, never a division error.
pub fn wilson_interval(successes: i64, trials: i64, level: ConfidenceLevel) -> (f64, f64) {
    if trials <= 0 {
        return (0.0, 0.0);
    }

    let n = trials as f64;
    let p = (successes.clamp(0, trials)) as f64 / n;
    let z = level.z();
    let z2 = z * z;

    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let margin = (z / denom) * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();

    ((center - margin).max(0.0), (center + margin).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_trials_degenerate_interval() {
        assert_eq!(wilson_interval(0, 0, ConfidenceLevel::P95), (0.0, 0.0));
    }

    #[test]
    fn test_interval_brackets_the_proportion() {
        for &(successes, trials) in &[(0i64, 10i64), (1, 10), (5, 10), (10, 10), (3, 1000)] {
            let p = successes as f64 / trials as f64;
            let (lo, hi) = wilson_interval(successes, trials, ConfidenceLevel::P95);
            assert!(lo >= 0.0, "lo out of range for {}/{}", successes, trials);
            assert!(hi <= 1.0, "hi out of range for {}/{}", successes, trials);
            assert!(lo <= p && p <= hi, "interval must bracket p for {}/{}", successes, trials);
        }
    }

    #[test]
    fn test_interval_bounds_hold_over_a_grid() {
        for trials in 0..=50i64 {
            for successes in 0..=trials {
                let (lo, hi) = wilson_interval(successes, trials, ConfidenceLevel::P99);
                assert!((0.0..=1.0).contains(&lo));
                assert!((0.0..=1.0).contains(&hi));
                assert!(lo <= hi);
            }
        }
    }

    #[test]
    fn test_low_volume_interval_stays_valid() {
        // 1 of 2: the normal approximation would poke outside [0,1] here
        let (lo, hi) = wilson_interval(1, 2, ConfidenceLevel::P95);
        assert!(lo > 0.0 && hi < 1.0);
    }

    #[test]
    fn test_wider_level_gives_wider_interval() {
        let (lo90, hi90) = wilson_interval(30, 100, ConfidenceLevel::P90);
        let (lo99, hi99) = wilson_interval(30, 100, ConfidenceLevel::P99);
        assert!(lo99 < lo90);
        assert!(hi99 > hi90);
    }

    #[test]
    fn test_known_value_spot_check() {
        // 50/100 at 95%: Wilson gives roughly [0.404, 0.596]
        let (lo, hi) = wilson_interval(50, 100, ConfidenceLevel::P95);
        assert!((lo - 0.4038).abs() < 0.001, "lo = {}", lo);
        assert!((hi - 0.5962).abs() < 0.001, "hi = {}", hi);
    }

    #[test]
    fn test_from_percent_lookup() {
        assert_eq!(ConfidenceLevel::from_percent(90), Some(ConfidenceLevel::P90));
        assert_eq!(ConfidenceLevel::from_percent(95), Some(ConfidenceLevel::P95));
        assert_eq!(ConfidenceLevel::from_percent(99), Some(ConfidenceLevel::P99));
        assert_eq!(ConfidenceLevel::from_percent(85), None);
    }
}
