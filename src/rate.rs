//! Null-safe rate arithmetic
//!
//! Every ratio in every result table goes through these helpers so the
//! zero-denominator policy is identical everywhere: an empty denominator
//! yields `None`, never `NaN`, `Inf` or a panic.

/// `round(100 * numerator / denominator, 2)`, or `None` when the
/// denominator is zero.
pub fn safe_percentage(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    Some(round2(100.0 * numerator as f64 / denominator as f64))
}

/// `round(numerator / denominator, 2)`, or `None` when the denominator is zero.
pub fn safe_ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    Some(round2(numerator as f64 / denominator as f64))
}

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominator_is_none() {
        assert_eq!(safe_percentage(0, 0), None);
        assert_eq!(safe_percentage(5, 0), None);
        assert_eq!(safe_ratio(12, 0), None);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(safe_percentage(1, 2), Some(50.0));
        assert_eq!(safe_percentage(1, 3), Some(33.33));
        assert_eq!(safe_percentage(2, 3), Some(66.67));
        assert_eq!(safe_percentage(3, 3), Some(100.0));
        assert_eq!(safe_percentage(0, 7), Some(0.0));
    }

    #[test]
    fn test_ratio_rounding() {
        assert_eq!(safe_ratio(10, 4), Some(2.5));
        assert_eq!(safe_ratio(10, 3), Some(3.33));
        assert_eq!(safe_ratio(0, 3), Some(0.0));
    }

    #[test]
    fn test_percentage_bounded_when_numerator_within_denominator() {
        for denominator in 1..50u64 {
            for numerator in 0..=denominator {
                let rate = safe_percentage(numerator, denominator).unwrap();
                assert!((0.0..=100.0).contains(&rate));
            }
        }
    }
}
