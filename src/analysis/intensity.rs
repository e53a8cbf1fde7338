//! Short-term intensity of audio signals
//!
//! Intensity is computed at analysis instants spaced `time_step` seconds
//! apart. At each instant the signal is weighted with a Kaiser window
//! (`beta = 2π² + 0.5`) of `6.4 / minimum_pitch` seconds, optionally after
//! subtracting the local mean, and the weighted mean square (averaged over
//! all channels) is expressed in dB relative to the squared auditory
//! threshold of `2e-5 Pa`.
//!
//! The analysis instants are centred on the window: a window of duration `D`
//! yields `floor((D - 6.4 / minimum_pitch) / time_step) + 1` values.

use crate::config::Options;
use crate::error::{config_error, Result};
use crate::math::power_to_db;
use crate::numbers::*;
use crate::pipeline::{Component, Transformer};
use crate::samples::{Frame, StreamInfo};
use crate::windowing::{Kaiser, Window};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Squared reference pressure (`(2e-5 Pa)²`)
pub const REFERENCE_POWER: f64 = 4e-10;

/// Options of the intensity analysis
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct IntensityConfig {
    /// Lowest pitch (Hz) the window must cover
    pub minimum_pitch: f64,
    /// Seconds between analysis instants (`0` selects `0.8 / minimum_pitch`)
    pub time_step: f64,
    /// Subtract the local mean before squaring
    pub subtract_mean_pressure: bool,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            minimum_pitch: 50.0,
            time_step: 0.0,
            subtract_mean_pressure: true,
        }
    }
}

impl IntensityConfig {
    /// Duration of the analysis window in seconds
    pub fn window_duration(&self) -> f64 {
        6.4 / self.minimum_pitch
    }
    /// Effective time step in seconds
    pub fn effective_time_step(&self) -> f64 {
        if self.time_step > 0.0 {
            self.time_step
        } else {
            0.8 / self.minimum_pitch
        }
    }
}

impl Options for IntensityConfig {
    fn validate(&self) -> Result<()> {
        if !(self.minimum_pitch.is_finite() && self.minimum_pitch > 0.0) {
            return Err(config_error(format!(
                "minimumPitch must be positive, got {}",
                self.minimum_pitch
            )));
        }
        if !(self.time_step.is_finite() && self.time_step >= 0.0) {
            return Err(config_error(format!(
                "timeStep must not be negative, got {}",
                self.time_step
            )));
        }
        Ok(())
    }
}

/// Intensity analysis for one sample rate
#[derive(Clone, Debug)]
pub struct IntensityAnalyzer {
    config: IntensityConfig,
    sample_rate: f64,
    half_samples: usize,
    window: Vec<f64>,
}

impl IntensityAnalyzer {
    /// Precompute the window for signals sampled at `sample_rate`
    pub fn new(sample_rate: f64, config: IntensityConfig) -> Result<Self> {
        config.validate()?;
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(config_error(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        let dx = 1.0 / sample_rate;
        let half_duration = config.window_duration() / 2.0;
        let half_samples = (half_duration / dx).floor() as usize;
        let window = Kaiser::intensity().sample_symmetric(half_samples, dx, half_duration);
        debug!(
            "intensity window: {} samples at {} Hz, step {} s",
            window.len(),
            sample_rate,
            config.effective_time_step()
        );
        Ok(Self {
            config,
            sample_rate,
            half_samples,
            window,
        })
    }
    /// Sample rate the window was computed for
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
    /// Options in use
    pub fn config(&self) -> &IntensityConfig {
        &self.config
    }
    /// Number of intensity values for a signal of `num_samples` samples
    ///
    /// Fails with [`Error::Config`] if the signal is shorter than the
    /// analysis window.
    ///
    /// [`Error::Config`]: crate::Error::Config
    pub fn frames(&self, num_samples: usize) -> Result<usize> {
        let duration = num_samples as f64 / self.sample_rate;
        let window_duration = self.config.window_duration();
        if duration < window_duration {
            return Err(config_error(format!(
                "signal of {duration} s is shorter than the intensity window of \
                 {window_duration} s (minimum pitch {} Hz)",
                self.config.minimum_pitch
            )));
        }
        let step = self.config.effective_time_step();
        Ok(((duration - window_duration) / step).floor() as usize + 1)
    }
    /// Intensity in dB of an interleaved signal with `dimension` channels
    pub fn analyze(&self, samples: &[f64], dimension: usize) -> Result<Vec<f32>> {
        let mut output = Vec::new();
        self.analyze_into(samples, dimension, &mut output)?;
        Ok(output)
    }
    /// Same as [`analyze`] but reuses the given vector
    ///
    /// [`analyze`]: Self::analyze
    pub fn analyze_into(
        &self,
        samples: &[f64],
        dimension: usize,
        output: &mut Vec<f32>,
    ) -> Result<()> {
        output.clear();
        if dimension == 0 {
            return Err(config_error("signal dimension must be positive"));
        }
        let n = samples.len() / dimension;
        let frames = self.frames(n)?;
        let dx = 1.0 / self.sample_rate;
        let dt = self.config.effective_time_step();
        let first = 0.5 * ((n - 1) as f64 * dx - (frames - 1) as f64 * dt);
        let half = self.half_samples as isize;
        let last = n as isize - 1;
        output.reserve(frames);
        for frame in 0..frames {
            let t = first + frame as f64 * dt;
            let mid = (t / dx).round() as isize;
            let left = (mid - half).max(0);
            let right = (mid + half).min(last);
            let mut sumxw = 0.0;
            let mut sumw = 0.0;
            for channel in 0..dimension {
                let value = |j: isize| samples[j as usize * dimension + channel];
                let mean = if self.config.subtract_mean_pressure {
                    (left..=right).map(&value).sum::<f64>() / (right - left + 1) as f64
                } else {
                    0.0
                };
                for j in left..=right {
                    let w = self.window[(j - mid + half) as usize];
                    let x = value(j) - mean;
                    sumxw += x * x * w;
                    sumw += w;
                }
            }
            let power = if sumw > 0.0 { sumxw / sumw } else { 0.0 };
            output.push(power_to_db(power / REFERENCE_POWER) as f32);
        }
        Ok(())
    }
}

/// Component computing the intensity contour of audio frames
///
/// Integer input is scaled to `[-1, 1]` by its full range; float input is
/// used as is (i.e. in Pascal).
#[derive(Clone, Debug)]
pub struct Intensity {
    config: IntensityConfig,
    analyzer: Option<IntensityAnalyzer>,
    scratch: Vec<f64>,
}

impl Intensity {
    /// Create component with given options
    pub fn new(config: IntensityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            analyzer: None,
            scratch: Vec::new(),
        })
    }
}

impl Component for Intensity {
    fn name(&self) -> &str {
        "Intensity"
    }
    fn enter(&mut self, inputs: &[StreamInfo]) -> Result<()> {
        let [input] = inputs else {
            return Err(config_error("Intensity expects exactly one input stream"));
        };
        self.analyzer = Some(IntensityAnalyzer::new(
            input.sample_rate,
            self.config.clone(),
        )?);
        Ok(())
    }
    fn flush(&mut self) -> Result<()> {
        self.scratch = Vec::new();
        Ok(())
    }
}

impl<T: Sample> Transformer<T, f32> for Intensity {
    fn output_dimension(&self, _: &[StreamInfo]) -> usize {
        1
    }
    fn output_samples(&self, input_samples: &[usize]) -> usize {
        match (&self.analyzer, input_samples) {
            (Some(analyzer), [n]) => analyzer.frames(*n).unwrap_or(0),
            _ => 0,
        }
    }
    fn output_labels(&self, _: &[StreamInfo]) -> Vec<String> {
        vec!["Intensity".to_string()]
    }
    fn transform(&mut self, frames: &[Frame<T>], output: &mut Vec<f32>) -> Result<()> {
        let frame = &frames[0];
        let stale = !matches!(
            &self.analyzer,
            Some(analyzer) if analyzer.sample_rate() == frame.sample_rate()
        );
        if stale {
            warn!("Intensity: recomputing window for {} Hz", frame.sample_rate());
            self.analyzer = Some(IntensityAnalyzer::new(
                frame.sample_rate(),
                self.config.clone(),
            )?);
        }
        let Some(analyzer) = &self.analyzer else {
            return Err(config_error("Intensity not entered"));
        };
        let scale = T::KIND.full_scale();
        self.scratch.clear();
        self.scratch
            .extend(frame.values.iter().map(|x| x.to_f64() / scale));
        analyzer.analyze_into(&self.scratch, frame.dimension(), output)
    }
}
