/// Maximum distance in seconds from the median for a report to count as an inlier
pub const DEFAULT_TIME_TOLERANCE_SECS: i64 = 5;

/// Estimate when a payload was really transmitted from the times its
/// receivers claim.
///
/// Reports within `tolerance_secs` of the median are averaged; when every
/// report is an outlier, all of them are. Returns `None` for no reports.
pub fn estimate_time_created(times: &[i64], tolerance_secs: i64) -> Option<i64> {
    if times.is_empty() {
        return None;
    }

    let mut sorted = times.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    // twice the median, kept integral
    let median2 = if sorted.len() % 2 == 0 {
        sorted[mid - 1] as i128 + sorted[mid] as i128
    } else {
        2 * sorted[mid] as i128
    };
    let tolerance2 = 2 * tolerance_secs as i128;

    let inliers: Vec<i64> = sorted
        .iter()
        .copied()
        .filter(|&t| (2 * t as i128 - median2).abs() <= tolerance2)
        .collect();

    if inliers.is_empty() {
        Some(truncated_mean(&sorted))
    } else {
        Some(truncated_mean(&inliers))
    }
}

fn truncated_mean(values: &[i64]) -> i64 {
    let sum: i128 = values.iter().map(|&v| v as i128).sum();
    (sum / values.len() as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignores_outlier() {
        assert_eq!(
            estimate_time_created(&[3, 3, 3, 10], DEFAULT_TIME_TOLERANCE_SECS),
            Some(3)
        );
    }

    #[test]
    fn test_mean_of_close_reports() {
        assert_eq!(
            estimate_time_created(&[3, 4, 5], DEFAULT_TIME_TOLERANCE_SECS),
            Some(4)
        );
    }

    #[test]
    fn test_single_report() {
        assert_eq!(estimate_time_created(&[1], DEFAULT_TIME_TOLERANCE_SECS), Some(1));
    }

    #[test]
    fn test_empty() {
        assert_eq!(estimate_time_created(&[], DEFAULT_TIME_TOLERANCE_SECS), None);
    }

    #[test]
    fn test_truncates_mean() {
        // (10 + 11) / 2 = 10.5
        assert_eq!(estimate_time_created(&[10, 11], DEFAULT_TIME_TOLERANCE_SECS), Some(10));
    }

    #[test]
    fn test_all_outliers_falls_back_to_mean_of_everything() {
        // median 550, both reports 450 away
        assert_eq!(estimate_time_created(&[100, 1000], 5), Some(550));
    }

    #[test]
    fn test_minority_of_bad_clocks() {
        let times = [1_700_000_000, 1_700_000_002, 1_700_000_001, 1_600_000_000, 1_800_000_000];
        assert_eq!(
            estimate_time_created(&times, DEFAULT_TIME_TOLERANCE_SECS),
            Some(1_700_000_001)
        );
    }

    #[test]
    fn test_exact_for_values_beyond_float_precision() {
        let base: i64 = 1 << 60;
        let times = [base, base + 1, base + 2, base + 10];
        assert_eq!(estimate_time_created(&times, 5), Some(base + 1));
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        assert_eq!(estimate_time_created(&[i64::MAX, i64::MAX], 0), Some(i64::MAX));
        assert_eq!(estimate_time_created(&[i64::MIN, i64::MAX], 0), Some(0));
    }

    #[test]
    fn test_order_does_not_matter() {
        assert_eq!(
            estimate_time_created(&[10, 3, 3, 3], DEFAULT_TIME_TOLERANCE_SECS),
            estimate_time_created(&[3, 3, 10, 3], DEFAULT_TIME_TOLERANCE_SECS)
        );
    }
}
