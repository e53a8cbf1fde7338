//! Peak detection in intensity contours
//!
//! Syllable nuclei show up as peaks in the intensity (dB) of speech which
//! are separated by sufficiently deep dips and fall into voiced regions.
//! [`find_peaks`] locates the peaks of one window, [`filter_voiced`] removes
//! those without voicing.

use crate::config::Options;
use crate::error::{config_error, Result};
use crate::math::{median, minimum};

use serde::{Deserialize, Serialize};

/// Options of speech-rate style peak detection
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PeakConfig {
    /// Peaks must exceed the window median by this many dB
    pub threshold_above_median: f32,
    /// Minimum depth (dB) of the dip separating two peaks
    pub min_dip_between_peaks: f32,
    /// Neighbourhood (samples to each side) a peak must dominate
    pub width: usize,
    /// Minimum voicing probability at a peak
    pub threshold_voiced_prob: f32,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            threshold_above_median: 0.0,
            min_dip_between_peaks: 3.0,
            width: 2,
            threshold_voiced_prob: 0.5,
        }
    }
}

impl Options for PeakConfig {
    fn validate(&self) -> Result<()> {
        if !self.threshold_above_median.is_finite() {
            return Err(config_error("thresholdAboveMedian must be finite"));
        }
        if !(self.min_dip_between_peaks >= 0.0 && self.min_dip_between_peaks.is_finite()) {
            return Err(config_error(format!(
                "minDipBetweenPeaks must not be negative, got {}",
                self.min_dip_between_peaks
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold_voiced_prob) {
            return Err(config_error(format!(
                "thresholdVoicedProb must be in [0, 1], got {}",
                self.threshold_voiced_prob
            )));
        }
        Ok(())
    }
}

fn is_raw_peak(signal: &[f32], i: usize, width: usize, threshold: f32) -> bool {
    let value = signal[i];
    if !(value > threshold) {
        return false;
    }
    let left = i.saturating_sub(width);
    let right = (i + width).min(signal.len() - 1);
    signal[left..i].iter().all(|&x| x < value) && signal[i + 1..=right].iter().all(|&x| x <= value)
}

/// Find peaks in `signal`
///
/// A sample is a peak if it exceeds `median + threshold_above_median` (but
/// at least the window minimum) and dominates `width` samples to each side,
/// where on a plateau the first sample counts. `width == 0` is treated as 1.
///
/// Walking from left to right, a peak is dropped if the lowest value between
/// it and the previously kept peak is within `min_dip` of its own value.
///
/// Returns the indices of the remaining peaks in ascending order.
pub fn find_peaks(
    signal: &[f32],
    threshold_above_median: f32,
    min_dip: f32,
    width: usize,
) -> Vec<usize> {
    let (Some(median), Some(floor)) = (median(signal), minimum(signal)) else {
        return Vec::new();
    };
    let threshold = (median + threshold_above_median).max(floor);
    let width = width.max(1);
    let mut peaks: Vec<usize> = Vec::new();
    for i in (0..signal.len()).filter(|&i| is_raw_peak(signal, i, width, threshold)) {
        if let Some(&previous) = peaks.last() {
            let dip = minimum(&signal[previous..=i]).unwrap_or(signal[i]);
            if signal[i] - dip <= min_dip {
                continue;
            }
        }
        peaks.push(i);
    }
    peaks
}

/// Keep only peaks where the time-aligned voicing probability exceeds
/// `threshold`
///
/// Peak indices refer to a signal sampled at `signal_rate`, `voicing` is
/// sampled at `voicing_rate`. Aligned indices past the voicing window are
/// clamped to its last sample.
pub fn filter_voiced(
    peaks: &[usize],
    signal_rate: f64,
    voicing: &[f32],
    voicing_rate: f64,
    threshold: f32,
) -> Vec<usize> {
    if voicing.is_empty() {
        return Vec::new();
    }
    peaks
        .iter()
        .copied()
        .filter(|&peak| {
            let index = (peak as f64 * voicing_rate / signal_rate).round() as usize;
            voicing[index.min(voicing.len() - 1)] > threshold
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_pairs;

    fn bumps(centers: &[usize], len: usize) -> Vec<f32> {
        let mut signal = vec![0.0; len];
        for &center in centers {
            for d in -5isize..=5 {
                let x = d as f32 / 2.0;
                signal[(center as isize + d) as usize] = (-x * x / 2.0).exp();
            }
        }
        signal
    }
    #[test]
    fn test_two_gaussian_bumps() {
        let signal = bumps(&[25, 75], 100);
        assert_eq!(find_peaks(&signal, 0.0, 0.1, 2), vec![25, 75]);
    }
    #[test]
    fn test_shallow_dip_merges_peaks() {
        let signal = [0.0, 5.0, 4.0, 4.5, 0.0, 0.0, 6.0, 0.0];
        assert_eq!(find_peaks(&signal, 0.0, 3.0, 1), vec![1, 6]);
        assert_eq!(find_peaks(&signal, 0.0, 0.1, 1), vec![1, 3, 6]);
    }
    #[test]
    fn test_culling_compares_with_last_kept_peak() {
        // index 3 is dropped, so index 5 is measured against index 1 and
        // sees the dip to 6.5
        let signal = [0.0, 10.0, 6.5, 9.0, 8.0, 10.0, 0.0];
        assert_eq!(find_peaks(&signal, 0.0, 3.0, 1), vec![1, 5]);
        assert_eq!(find_peaks(&signal, 0.0, 4.0, 1), vec![1]);
    }
    #[test]
    fn test_threshold_and_plateau() {
        let signal = [1.0, 3.0, 3.0, 1.0, 1.0, 2.0, 1.0];
        assert_eq!(find_peaks(&signal, 0.0, 0.0, 0), vec![1, 5]);
        assert_eq!(find_peaks(&signal, 1.5, 0.0, 1), vec![1]);
        let flat = [2.0; 10];
        assert!(find_peaks(&flat, 0.0, 0.0, 2).is_empty());
        assert!(find_peaks(&[], 0.0, 0.0, 2).is_empty());
    }
    #[test]
    fn test_filter_voiced() {
        let voicing = [0.9, 0.1, 0.6, 0.7];
        let peaks = [0, 10, 20, 31, 100];
        assert_eq!(filter_voiced(&peaks, 100.0, &voicing, 10.0, 0.5), vec![0, 20, 31, 100]);
        assert!(filter_voiced(&peaks, 100.0, &[], 10.0, 0.5).is_empty());
    }
    #[test]
    fn test_config() {
        let config = PeakConfig::default();
        assert_eq!(config.min_dip_between_peaks, 3.0);
        assert_eq!(config.threshold_voiced_prob, 0.5);
        assert!(from_pairs::<PeakConfig>(&[("thresholdVoicedProb", "1.5")]).is_err());
        let config: PeakConfig = from_pairs(&[("width", "4")]).unwrap();
        assert_eq!(config.width, 4);
    }
}
