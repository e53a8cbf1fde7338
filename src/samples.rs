//! Stream description and frame data types
//!
//! See [`StreamInfo`] and [`Frame`].

use crate::error::{config_error, Result};
use crate::numbers::*;

use serde::{Deserialize, Serialize};

/// Description of a sample stream
///
/// A stream is an append-only sequence of fixed-dimension vectors, one per
/// instant, produced at a fixed `sample_rate`.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Samples per second
    pub sample_rate: f64,
    /// Number of values per sample (e.g. `3` for XYZ acceleration)
    pub dimension: usize,
    /// Storage kind of the values
    pub kind: NumericKind,
    /// Time of the first sample in seconds (pipeline relative)
    pub start_time: f64,
    /// Name of each dimension
    pub labels: Vec<String>,
}

impl StreamInfo {
    /// Describe a stream with default labels and a start time of zero
    pub fn new(sample_rate: f64, dimension: usize, kind: NumericKind) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(config_error(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        if dimension == 0 {
            return Err(config_error("stream dimension must be positive"));
        }
        Ok(Self {
            sample_rate,
            dimension,
            kind,
            start_time: 0.0,
            labels: (0..dimension).map(|d| format!("dim{d}")).collect(),
        })
    }
    /// Replace dimension labels (one label per dimension required)
    pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Result<Self> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.len() != self.dimension {
            return Err(config_error(format!(
                "expected {} labels, got {}",
                self.dimension,
                labels.len()
            )));
        }
        self.labels = labels;
        Ok(self)
    }
    /// Set time of the first sample
    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }
    /// Number of samples covering `seconds` (rounded)
    pub fn samples_for(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate).round().max(0.0) as u64
    }
    /// Time of sample with given index
    pub fn time_of(&self, index: u64) -> f64 {
        self.start_time + index as f64 / self.sample_rate
    }
}

/// One time-aligned window of a source stream, as handed to a [component]
///
/// Values are interleaved, i.e. sample `i` occupies
/// `values[i * dimension..(i + 1) * dimension]`.
///
/// [component]: crate::pipeline::Component
#[derive(Clone, Debug)]
pub struct Frame<T> {
    /// Description of the source stream
    pub info: StreamInfo,
    /// Index of the first sample within the source stream
    pub start: u64,
    /// Interleaved sample values
    pub values: Vec<T>,
}

impl<T: Sample> Frame<T> {
    /// Sample rate of the source when this frame was read
    pub fn sample_rate(&self) -> f64 {
        self.info.sample_rate
    }
    /// Values per sample
    pub fn dimension(&self) -> usize {
        self.info.dimension
    }
    /// Number of samples (not values) in the frame
    pub fn num_samples(&self) -> usize {
        self.values.len() / self.info.dimension
    }
    /// Values of sample `i`
    pub fn sample(&self, i: usize) -> &[T] {
        let dim = self.info.dimension;
        &self.values[i * dim..(i + 1) * dim]
    }
    /// All values of dimension `d` converted to `f32`
    pub fn column(&self, d: usize) -> Vec<f32> {
        self.values
            .chunks_exact(self.info.dimension)
            .map(|sample| sample[d].to_f32())
            .collect()
    }
    /// All values converted to `f32` (still interleaved)
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|x| x.to_f32()).collect()
    }
    /// Time of the first sample in seconds
    pub fn time(&self) -> f64 {
        self.info.time_of(self.start)
    }
    /// Duration covered by the frame in seconds
    pub fn duration(&self) -> f64 {
        self.num_samples() as f64 / self.info.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_approx;
    #[test]
    fn test_stream_info_validation() {
        assert!(StreamInfo::new(0.0, 1, NumericKind::Float).is_err());
        assert!(StreamInfo::new(-5.0, 1, NumericKind::Float).is_err());
        assert!(StreamInfo::new(f64::NAN, 1, NumericKind::Float).is_err());
        assert!(StreamInfo::new(50.0, 0, NumericKind::Float).is_err());
        let info = StreamInfo::new(50.0, 3, NumericKind::Float).unwrap();
        assert_eq!(info.labels, vec!["dim0", "dim1", "dim2"]);
        assert!(info.clone().with_labels(["AccX", "AccY"]).is_err());
        let info = info.with_labels(["AccX", "AccY", "AccZ"]).unwrap();
        assert_eq!(info.labels[2], "AccZ");
    }
    #[test]
    fn test_frame_accessors() {
        let info = StreamInfo::new(4.0, 2, NumericKind::Short)
            .unwrap()
            .with_start_time(10.0);
        let frame = Frame::<i16> {
            info,
            start: 8,
            values: vec![1, -1, 2, -2, 3, -3],
        };
        assert_eq!(frame.num_samples(), 3);
        assert_eq!(frame.sample(1), &[2, -2]);
        assert_eq!(frame.column(1), vec![-1.0, -2.0, -3.0]);
        assert_approx(frame.time(), 12.0);
        assert_approx(frame.duration(), 0.75);
    }
}
