//! Time-aligned frames from sources running at different sample rates
//!
//! A [`FrameSynchronizer`] turns a frame duration and an optional overlap
//! (`delta`, both in seconds) into a concrete sample window for every source
//! buffer. For source `i` with rate `r_i`:
//!
//! * `frame_samples_i = round(frame * r_i)`
//! * `step_samples_i = round((frame - delta) * r_i)`
//! * the window of cycle `c` is
//!   `[c * step_samples_i, c * step_samples_i + frame_samples_i)`
//!
//! Window positions are computed from the cycle counter with integer
//! arithmetic, so they never drift. With `delta == 0`, successive frames of a
//! source concatenate to the source stream without gaps or duplicates.
//!
//! The cycle counter only advances through [`FrameSynchronizer::advance`];
//! frames are thus requested in non-decreasing order regardless of how data
//! arrives.

use crate::buffer::{ReadCursor, SampleBuffer};
use crate::config::Options;
use crate::error::{config_error, Error, Result};
use crate::numbers::*;
use crate::samples::Frame;
use crate::sync::stop::StopToken;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use std::sync::Arc;
use std::time::Duration;

/// Frame timing of a synchronizer
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynchronizerConfig {
    /// Frame duration in seconds
    pub frame: f64,
    /// Overlap of successive frames in seconds
    pub delta: f64,
    /// Maximum time in seconds to wait for input before failing
    /// (`None` waits until stopped)
    pub timeout: Option<f64>,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            frame: 1.0,
            delta: 0.0,
            timeout: None,
        }
    }
}

impl SynchronizerConfig {
    /// Frames of given duration without overlap
    pub fn new(frame: f64) -> Self {
        Self {
            frame,
            ..Default::default()
        }
    }
    /// Set overlap
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }
    /// Set timeout
    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Options for SynchronizerConfig {
    fn validate(&self) -> Result<()> {
        if !(self.frame.is_finite() && self.frame > 0.0) {
            return Err(config_error(format!(
                "frame duration must be positive, got {}",
                self.frame
            )));
        }
        if !(self.delta >= 0.0 && self.delta < self.frame) {
            return Err(config_error(format!(
                "delta must be in [0, {}), got {}",
                self.frame, self.delta
            )));
        }
        if let Some(timeout) = self.timeout {
            if !(timeout.is_finite() && timeout > 0.0) {
                return Err(config_error(format!(
                    "timeout must be positive, got {timeout}"
                )));
            }
        }
        Ok(())
    }
}

/// Sample window of one source
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Window {
    /// Index of first sample
    pub start: u64,
    /// Number of samples
    pub count: usize,
}

impl Window {
    /// Index one past the last sample
    pub fn end(&self) -> u64 {
        self.start + self.count as u64
    }
}

#[derive(Clone, Debug)]
struct SourceTiming {
    sample_rate: f64,
    frame_samples: usize,
    step_samples: u64,
    origin: u64,
    origin_cycle: u64,
}

impl SourceTiming {
    fn new(
        source: usize,
        sample_rate: f64,
        capacity: usize,
        config: &SynchronizerConfig,
        origin: u64,
        origin_cycle: u64,
    ) -> Result<Self> {
        let frame_samples = (config.frame * sample_rate).round() as usize;
        let step_samples = ((config.frame - config.delta) * sample_rate).round() as u64;
        if frame_samples == 0 {
            return Err(config_error(format!(
                "frame of {} s is shorter than one sample of source {} ({} Hz)",
                config.frame, source, sample_rate
            )));
        }
        if step_samples == 0 {
            return Err(config_error(format!(
                "frame step of {} s is shorter than one sample of source {} ({} Hz)",
                config.frame - config.delta,
                source,
                sample_rate
            )));
        }
        if capacity < frame_samples {
            return Err(config_error(format!(
                "buffer of source {} holds {} samples, frame needs {}",
                source, capacity, frame_samples
            )));
        }
        Ok(Self {
            sample_rate,
            frame_samples,
            step_samples,
            origin,
            origin_cycle,
        })
    }
    fn window(&self, cycle: u64) -> Window {
        Window {
            start: self.origin + (cycle - self.origin_cycle) * self.step_samples,
            count: self.frame_samples,
        }
    }
}

/// Pulls time-aligned frames from one or more [`SampleBuffer`]s
pub struct FrameSynchronizer<T> {
    sources: Vec<Arc<SampleBuffer<T>>>,
    timings: Vec<SourceTiming>,
    cursors: Vec<ReadCursor>,
    config: SynchronizerConfig,
    cycle: u64,
}

impl<T: Sample> FrameSynchronizer<T> {
    /// Set up synchronization of `sources`
    ///
    /// Fails with [`Error::Config`] if the configuration is invalid, a frame
    /// or step rounds to zero samples for some source, or a source buffer is
    /// too small to ever hold a whole frame.
    pub fn new(sources: Vec<Arc<SampleBuffer<T>>>, config: SynchronizerConfig) -> Result<Self> {
        config.validate()?;
        if sources.is_empty() {
            return Err(config_error("at least one source is required"));
        }
        let timings = sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                SourceTiming::new(i, source.sample_rate(), source.capacity(), &config, 0, 0)
            })
            .collect::<Result<Vec<_>>>()?;
        let cursors = sources.iter().map(|source| source.register_reader(0)).collect();
        for (i, timing) in timings.iter().enumerate() {
            info!(
                "source {}: {} Hz, frame {} samples, step {} samples",
                i, timing.sample_rate, timing.frame_samples, timing.step_samples
            );
        }
        Ok(Self {
            sources,
            timings,
            cursors,
            config,
            cycle: 0,
        })
    }
    /// Configuration in use
    pub fn config(&self) -> &SynchronizerConfig {
        &self.config
    }
    /// Number of completed cycles
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
    /// Source buffers
    pub fn sources(&self) -> &[Arc<SampleBuffer<T>>] {
        &self.sources
    }
    /// Samples per frame of given source
    pub fn frame_samples(&self, source: usize) -> usize {
        self.timings[source].frame_samples
    }
    /// Samples between the starts of successive frames of given source
    pub fn step_samples(&self, source: usize) -> u64 {
        self.timings[source].step_samples
    }
    /// Window of given source in given cycle
    ///
    /// Cycles before the last rate change of the source are reported with
    /// the current timing.
    pub fn window(&self, source: usize, cycle: u64) -> Window {
        let timing = &self.timings[source];
        timing.window(cycle.max(timing.origin_cycle))
    }
    /// Windows of all sources in the current cycle
    pub fn current_windows(&self) -> Vec<Window> {
        (0..self.sources.len())
            .map(|i| self.window(i, self.cycle))
            .collect()
    }
    /// Sample rate of a stream receiving `samples_per_frame` samples per
    /// cycle
    pub fn output_rate(&self, samples_per_frame: usize) -> f64 {
        let timing = &self.timings[0];
        samples_per_frame as f64 * timing.sample_rate / timing.step_samples as f64
    }
    fn refresh_rates(&mut self) -> Result<()> {
        for i in 0..self.sources.len() {
            let sample_rate = self.sources[i].sample_rate();
            if sample_rate != self.timings[i].sample_rate {
                let origin = self.timings[i].window(self.cycle).start;
                warn!(
                    "source {} changed rate from {} Hz to {} Hz at cycle {}",
                    i, self.timings[i].sample_rate, sample_rate, self.cycle
                );
                self.timings[i] = SourceTiming::new(
                    i,
                    sample_rate,
                    self.sources[i].capacity(),
                    &self.config,
                    origin,
                    self.cycle,
                )?;
            }
        }
        Ok(())
    }
    /// Read the frames of the current cycle without waiting
    ///
    /// Fails with [`Error::Underrun`] if some source has not yet written its
    /// window.
    pub fn try_frames(&mut self) -> Result<Vec<Frame<T>>> {
        self.refresh_rates()?;
        let windows = self.current_windows();
        self.read(&windows)
    }
    /// Wait for and read the frames of the current cycle
    ///
    /// Returns `Ok(None)` when `stop` is signalled while waiting, and
    /// [`Error::Timeout`] if the configured timeout elapses first.
    pub async fn next_frames(&mut self, stop: &StopToken) -> Result<Option<Vec<Frame<T>>>> {
        self.refresh_rates()?;
        let windows = self.current_windows();
        let sources = &self.sources;
        let ready = async {
            for (source, window) in sources.iter().zip(windows.iter()) {
                if !source.wait_for(window.end(), stop).await? {
                    return Ok::<bool, Error>(false);
                }
            }
            Ok(true)
        };
        let ready = match self.config.timeout {
            Some(timeout) => {
                let timeout = Duration::from_secs_f64(timeout);
                match tokio::time::timeout(timeout, ready).await {
                    Ok(ready) => ready?,
                    Err(_) => {
                        warn!("no input for {:?} at cycle {}", timeout, self.cycle);
                        return Err(Error::Timeout(timeout));
                    }
                }
            }
            None => ready.await?,
        };
        if !ready {
            debug!("stopped while waiting for cycle {}", self.cycle);
            return Ok(None);
        }
        self.read(&windows).map(Some)
    }
    fn read(&self, windows: &[Window]) -> Result<Vec<Frame<T>>> {
        trace!("cycle {}: reading {:?}", self.cycle, windows);
        self.sources
            .iter()
            .zip(windows.iter())
            .map(|(source, window)| {
                Ok(Frame {
                    info: source.info(),
                    start: window.start,
                    values: source.read_window(window.start, window.count)?,
                })
            })
            .collect()
    }
    /// Finish the current cycle
    ///
    /// Moves every read cursor to the start of the next window, allowing
    /// producers to overwrite older samples.
    pub fn advance(&mut self) {
        self.cycle += 1;
        for (i, cursor) in self.cursors.iter().enumerate() {
            cursor.advance_to(self.timings[i].window(self.cycle).start);
        }
    }
}
