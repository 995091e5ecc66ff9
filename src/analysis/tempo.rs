//! Tempo summaries
//!
//! Median-based tempo estimates, used both on decoded state paths (median
//! interval in frames) and on plain beat timestamps (median inter-beat time).

use crate::features::dbn::state_space::interval_to_bpm;

/// Median of a list of values (mean of the two middle values for even counts)
///
/// Returns 0.0 for an empty slice.
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median of interval values in frames
pub fn interval_median(intervals: &[u32]) -> f32 {
    let values: Vec<f32> = intervals.iter().map(|&i| i as f32).collect();
    median(&values)
}

/// Tempo in BPM from the median of intervals in frames
///
/// Returns 0.0 for an empty slice.
pub fn median_interval_bpm(intervals: &[u32], fps: f32) -> f32 {
    let m = interval_median(intervals);
    if m > 0.0 {
        interval_to_bpm(m, fps)
    } else {
        0.0
    }
}

/// Estimate BPM from beat times in seconds
///
/// Uses the median inter-beat interval and rounds to one decimal place.
/// Returns 0.0 for fewer than two beats or a non-positive median interval.
pub fn estimate_bpm_from_beats(beat_times: &[f32]) -> f32 {
    if beat_times.len() < 2 {
        return 0.0;
    }
    let diffs: Vec<f32> = beat_times.windows(2).map(|w| w[1] - w[0]).collect();
    let median_interval = median(&diffs);
    if median_interval > 0.0 {
        (60.0 / median_interval * 10.0).round() / 10.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[3.0]), 3.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn test_median_interval_bpm() {
        assert!((median_interval_bpm(&[50, 50, 49, 51, 50], 100.0) - 120.0).abs() < 1e-3);
        assert_eq!(median_interval_bpm(&[], 100.0), 0.0);
    }

    #[test]
    fn test_median_ignores_short_excursions() {
        let mut intervals = vec![50u32; 90];
        intervals.extend(vec![30u32; 10]);
        assert!((median_interval_bpm(&intervals, 100.0) - 120.0).abs() < 1e-3);
    }

    #[test]
    fn test_estimate_bpm_from_beats() {
        let beats = vec![0.0, 0.5, 1.0, 1.5, 2.0];
        assert_eq!(estimate_bpm_from_beats(&beats), 120.0);

        let beats = vec![0.0, 0.469, 0.938, 1.406];
        assert!((estimate_bpm_from_beats(&beats) - 127.9).abs() < 0.2);

        assert_eq!(estimate_bpm_from_beats(&[1.0]), 0.0);
        assert_eq!(estimate_bpm_from_beats(&[1.0, 1.0]), 0.0);
    }
}
