//! Window functions

use crate::math::*;

/// Window function
pub trait Window {
    /// Get value at position `x` (where `x` ranges from `-1.0` to `1.0`)
    /// multiplied with unknown constant
    fn relative_value_at(&self, x: f64) -> f64;
    /// Sample the window symmetrically with `half_len` values on each side of
    /// the center, i.e. `2 * half_len + 1` values
    ///
    /// Position `i` (from `-half_len` to `half_len`) is evaluated at
    /// `x = i * spacing / half_width`, so a window wider than the sampled
    /// span is truncated and a narrower one is zero-padded.
    fn sample_symmetric(&self, half_len: usize, spacing: f64, half_width: f64) -> Vec<f64> {
        let half = half_len as isize;
        (-half..=half)
            .map(|i| self.relative_value_at(i as f64 * spacing / half_width))
            .collect()
    }
}

/// Rectangular window
#[derive(Clone, Debug)]
pub struct Rectangular;

impl Window for Rectangular {
    fn relative_value_at(&self, _: f64) -> f64 {
        1.0
    }
}

/// Kaiser window
#[derive(Clone, Debug)]
pub struct Kaiser {
    beta: f64,
}

impl Window for Kaiser {
    fn relative_value_at(&self, x: f64) -> f64 {
        kaiser_rel_with_beta(self.beta, x)
    }
}

impl Kaiser {
    /// Kaiser window with given `beta` parameter
    pub fn with_beta(beta: f64) -> Self {
        Self { beta }
    }
    /// Kaiser window used for short-term intensity analysis
    /// (`beta = 2π² + 0.5`)
    pub fn intensity() -> Self {
        Self::with_beta(2.0 * std::f64::consts::PI * std::f64::consts::PI + 0.5)
    }
    /// The `beta` parameter
    pub fn beta(&self) -> f64 {
        self.beta
    }
}
