//! Spectral descriptors of a real-valued window
//!
//! [`Spectrum`] computes the magnitudes of the non-negative frequency bins
//! of a window; the free functions reduce such a magnitude array to a single
//! value. Bin indices (not frequencies in Hz) are used throughout.

use crate::numbers::Complex;

use rustfft::{Fft, FftPlanner};

use std::sync::Arc;

/// Fraction of the total magnitude below the [`rolloff`] bin
pub const ROLLOFF_FRACTION: f32 = 0.93;

/// Forward FFT of real windows, returning the half spectrum magnitudes
///
/// The FFT plan is kept and only recomputed when the window length changes.
pub struct Spectrum {
    planner: FftPlanner<f32>,
    fft: Option<(usize, Arc<dyn Fft<f32>>)>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::new()
    }
}

impl Spectrum {
    /// Create analyzer without any plan
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            fft: None,
            buffer: Vec::new(),
            scratch: Vec::new(),
        }
    }
    /// Magnitudes of bins `0..=N/2` of a window of length `N`
    pub fn magnitudes(&mut self, window: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(window.len() / 2 + 1);
        self.magnitudes_into(window, &mut output);
        output
    }
    /// Same as [`magnitudes`] but reuses the given vector
    ///
    /// [`magnitudes`]: Self::magnitudes
    pub fn magnitudes_into(&mut self, window: &[f32], output: &mut Vec<f32>) {
        output.clear();
        let n = window.len();
        if n == 0 {
            return;
        }
        let fft = match &self.fft {
            Some((len, fft)) if *len == n => fft.clone(),
            _ => {
                let fft = self.planner.plan_fft_forward(n);
                self.scratch
                    .resize(fft.get_inplace_scratch_len(), Complex::new(0.0, 0.0));
                self.fft = Some((n, fft.clone()));
                fft
            }
        };
        self.buffer.clear();
        self.buffer
            .extend(window.iter().map(|&x| Complex::new(x, 0.0)));
        fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        output.extend(self.buffer[..n / 2 + 1].iter().map(|c| c.norm()));
    }
}

fn power(magnitudes: &[f32]) -> f32 {
    magnitudes.iter().map(|m| m * m).sum()
}

/// Mean of the squared magnitudes
pub fn energy(magnitudes: &[f32]) -> f32 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    power(magnitudes) / magnitudes.len() as f32
}

/// Shannon entropy (natural logarithm) of the normalized power spectrum
///
/// Zero for a spectrum without power.
pub fn entropy(magnitudes: &[f32]) -> f32 {
    let total = power(magnitudes);
    if total <= 0.0 {
        return 0.0;
    }
    -magnitudes
        .iter()
        .map(|m| m * m / total)
        .filter(|&p| p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f32>()
}

/// Power weighted mean bin index
///
/// Zero for a spectrum without power.
pub fn centroid(magnitudes: &[f32]) -> f32 {
    let total = power(magnitudes);
    if total <= 0.0 {
        return 0.0;
    }
    magnitudes
        .iter()
        .enumerate()
        .map(|(k, m)| k as f32 * m * m)
        .sum::<f32>()
        / total
}

/// Smallest bin at which the cumulative magnitude reaches
/// [`ROLLOFF_FRACTION`] of the total
///
/// Zero for a spectrum without magnitude.
pub fn rolloff(magnitudes: &[f32]) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = total * ROLLOFF_FRACTION;
    let mut cumulative = 0.0;
    for (k, &m) in magnitudes.iter().enumerate() {
        cumulative += m;
        if cumulative >= threshold {
            return k as f32;
        }
    }
    (magnitudes.len() - 1) as f32
}

/// Sum of squared differences between neighbouring bins, starting with
/// bin 0 against zero
pub fn flux(magnitudes: &[f32]) -> f32 {
    let mut previous = 0.0;
    let mut sum = 0.0;
    for &m in magnitudes {
        let d = m - previous;
        sum += d * d;
        previous = m;
    }
    sum
}
