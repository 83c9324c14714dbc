//! Score peak picking.
//!
//! ## Algorithm
//!
//! 1. Walk the score sequence and collect interior local maxima. A plateau
//!    counts once, at its first index, and only if it is followed by a drop.
//!    The first and last scores are never peaks: their outer neighbour is
//!    unknown.
//! 2. Keep maxima whose score is at or above the threshold.
//! 3. If a minimum separation is given, visit the survivors from the highest
//!    score down (earlier index first on ties) and discard every other
//!    survivor closer than the separation to an already-kept peak.

use std::cmp::Ordering;

/// Indices of thresholded score peaks, in ascending order.
///
/// `min_separation` is measured in windows and may be fractional; `None` (or
/// a separation of at most one window) leaves every local maximum in place.
pub fn find_peaks(scores: &[f32], threshold: f32, min_separation: Option<f64>) -> Vec<usize> {
    let candidates: Vec<usize> = local_maxima(scores)
        .into_iter()
        .filter(|&i| scores[i] >= threshold)
        .collect();

    match min_separation {
        Some(separation) if separation > 1.0 && candidates.len() > 1 => {
            enforce_separation(scores, candidates, separation)
        }
        _ => candidates,
    }
}

fn local_maxima(scores: &[f32]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if scores.len() < 3 {
        return maxima;
    }

    let last = scores.len() - 1;
    let mut i = 1;
    while i < last {
        if scores[i] > scores[i - 1] {
            // Skip across a plateau of equal scores.
            let mut end = i;
            while end < last && scores[end + 1] == scores[i] {
                end += 1;
            }
            if end < last && scores[end + 1] < scores[i] {
                maxima.push(i);
            }
            i = end + 1;
        } else {
            i += 1;
        }
    }
    maxima
}

fn enforce_separation(scores: &[f32], candidates: Vec<usize>, separation: f64) -> Vec<usize> {
    let mut by_priority = candidates;
    by_priority.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut kept: Vec<usize> = Vec::with_capacity(by_priority.len());
    for candidate in by_priority {
        let too_close = kept
            .iter()
            .any(|&k| (candidate.abs_diff(k) as f64) < separation);
        if !too_close {
            kept.push(candidate);
        }
    }

    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_spike_is_one_peak() {
        let scores = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        assert_eq!(find_peaks(&scores, 0.5, Some(0.0)), vec![3]);
        assert_eq!(find_peaks(&scores, 0.5, None), vec![3]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let scores = [0.1, 0.5, 0.1];
        assert_eq!(find_peaks(&scores, 0.5, None), vec![1]);
        assert!(find_peaks(&scores, 0.51, None).is_empty());
    }

    #[test]
    fn plateau_resolves_to_earliest_index() {
        let scores = [0.0, 0.8, 0.8, 0.8, 0.1];
        assert_eq!(find_peaks(&scores, 0.5, None), vec![1]);
    }

    #[test]
    fn rising_edge_at_end_is_not_a_peak() {
        assert!(find_peaks(&[0.1, 0.5, 0.9], 0.0, None).is_empty());
        assert!(find_peaks(&[0.1, 0.9, 0.9], 0.0, None).is_empty());
        assert!(find_peaks(&[0.9, 0.5, 0.1], 0.0, None).is_empty());
    }

    #[test]
    fn empty_and_tiny_inputs_never_fail() {
        assert!(find_peaks(&[], 0.5, None).is_empty());
        assert!(find_peaks(&[1.0], 0.5, Some(3.0)).is_empty());
        assert!(find_peaks(&[1.0, 0.0], 0.5, None).is_empty());
        assert!(find_peaks(&[0.1, 0.2, 0.1], 0.5, None).is_empty());
    }

    #[test]
    fn separation_keeps_higher_of_close_peaks() {
        //               0    1    2    3    4    5    6    7    8
        let scores = [0.0, 0.7, 0.0, 0.9, 0.0, 0.0, 0.0, 0.8, 0.0];
        assert_eq!(find_peaks(&scores, 0.5, None), vec![1, 3, 7]);
        assert_eq!(find_peaks(&scores, 0.5, Some(3.0)), vec![3, 7]);
        assert_eq!(find_peaks(&scores, 0.5, Some(4.0)), vec![3, 7]);
        assert_eq!(find_peaks(&scores, 0.5, Some(4.5)), vec![3]);
    }

    #[test]
    fn separation_tie_keeps_earlier_peak() {
        let scores = [0.0, 0.8, 0.0, 0.8, 0.0];
        assert_eq!(find_peaks(&scores, 0.5, Some(3.0)), vec![1]);
    }

    #[test]
    fn suppressed_peak_does_not_suppress_others() {
        // 4 is suppressed by 2; 6 is far enough from 2 and survives.
        let scores = [0.0, 0.0, 1.0, 0.0, 0.9, 0.0, 0.8, 0.0];
        assert_eq!(find_peaks(&scores, 0.5, Some(3.0)), vec![2, 6]);
    }

    #[test]
    fn accepted_peaks_respect_separation() {
        let scores: Vec<f32> = (0..200)
            .map(|i| ((i as f32) * 0.37).sin().abs() * ((i % 7) as f32 / 7.0))
            .collect();
        let peaks = find_peaks(&scores, 0.2, Some(5.0));
        for pair in peaks.windows(2) {
            assert!(pair[1] - pair[0] >= 5, "peaks {pair:?} too close");
        }
    }

    #[test]
    fn higher_threshold_peaks_are_lower_threshold_candidates() {
        let scores = [0.2, 0.6, 0.95, 0.3, 0.55, 0.1, 0.92, 0.4];
        let low = find_peaks(&scores, 0.5, None);
        let high = find_peaks(&scores, 0.9, None);
        assert!(high.iter().all(|p| low.contains(p)));
        assert_eq!(high, vec![2, 6]);
    }

    #[test]
    fn nan_scores_are_never_peaks() {
        let scores = [0.0, f32::NAN, 0.0, 0.8, 0.0];
        assert_eq!(find_peaks(&scores, 0.5, Some(2.0)), vec![3]);
    }
}
