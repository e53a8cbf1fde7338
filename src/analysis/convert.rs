//! Sample-wise conversion of streams
//!
//! Both components pass every input sample through. They are rejected on
//! overlapping frames (`delta > 0`), so the output rate equals the input
//! rate.

use crate::error::{config_error, Result};
use crate::numbers::*;
use crate::pipeline::{Component, Transformer};
use crate::samples::{Frame, StreamInfo};

use std::marker::PhantomData;

/// Converts samples of any kind to `f32`, scaling integer kinds to `[-1, 1]`
#[derive(Clone, Debug, Default)]
pub struct Normalize;

impl Component for Normalize {
    fn name(&self) -> &str {
        "Normalize"
    }
    fn enter(&mut self, inputs: &[StreamInfo]) -> Result<()> {
        let [_] = inputs else {
            return Err(config_error("Normalize expects exactly one input stream"));
        };
        Ok(())
    }
}

impl<T: Sample> Transformer<T, f32> for Normalize {
    fn output_dimension(&self, inputs: &[StreamInfo]) -> usize {
        inputs[0].dimension
    }
    fn output_samples(&self, input_samples: &[usize]) -> usize {
        input_samples[0]
    }
    fn passes_samples_through(&self) -> bool {
        true
    }
    fn output_labels(&self, inputs: &[StreamInfo]) -> Vec<String> {
        inputs[0].labels.clone()
    }
    fn transform(&mut self, frames: &[Frame<T>], output: &mut Vec<f32>) -> Result<()> {
        let scale = T::KIND.full_scale();
        output.extend(
            frames[0]
                .values
                .iter()
                .map(|x| (x.to_f64() / scale) as f32),
        );
        Ok(())
    }
}

/// Selects a subset of dimensions, e.g. one axis of an accelerometer
#[derive(Clone, Debug)]
pub struct Selector<T> {
    indices: Vec<usize>,
    _sample: PhantomData<fn() -> T>,
}

impl<T> Selector<T> {
    /// Select the given dimensions (in the given order)
    pub fn new(indices: Vec<usize>) -> Result<Self> {
        if indices.is_empty() {
            return Err(config_error("Selector needs at least one dimension"));
        }
        Ok(Self {
            indices,
            _sample: PhantomData,
        })
    }
}

impl<T: Sample> Component for Selector<T> {
    fn name(&self) -> &str {
        "Selector"
    }
    fn enter(&mut self, inputs: &[StreamInfo]) -> Result<()> {
        let [input] = inputs else {
            return Err(config_error("Selector expects exactly one input stream"));
        };
        if let Some(&index) = self.indices.iter().find(|&&i| i >= input.dimension) {
            return Err(config_error(format!(
                "cannot select dimension {} of {}",
                index, input.dimension
            )));
        }
        Ok(())
    }
}

impl<T: Sample> Transformer<T, T> for Selector<T> {
    fn output_dimension(&self, _: &[StreamInfo]) -> usize {
        self.indices.len()
    }
    fn output_samples(&self, input_samples: &[usize]) -> usize {
        input_samples[0]
    }
    fn passes_samples_through(&self) -> bool {
        true
    }
    fn output_labels(&self, inputs: &[StreamInfo]) -> Vec<String> {
        self.indices
            .iter()
            .map(|&i| inputs[0].labels[i].clone())
            .collect()
    }
    fn transform(&mut self, frames: &[Frame<T>], output: &mut Vec<T>) -> Result<()> {
        let frame = &frames[0];
        for i in 0..frame.num_samples() {
            let sample = frame.sample(i);
            output.extend(self.indices.iter().map(|&d| sample[d]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;
    use crate::error::Error;
    use crate::pipeline::Pipeline;
    use crate::synchronizer::SynchronizerConfig;
    use std::sync::Arc;

    #[test]
    fn test_normalize() {
        let info = StreamInfo::new(10.0, 1, NumericKind::Short).unwrap();
        let frame = Frame::<i16> {
            info,
            start: 0,
            values: vec![i16::MIN, 0, 16384],
        };
        let mut output = Vec::new();
        Normalize.transform(&[frame], &mut output).unwrap();
        assert_eq!(output, vec![-1.0, 0.0, 0.5]);
    }
    #[test]
    fn test_selector_rejects_missing_dimension() {
        let info = StreamInfo::new(10.0, 2, NumericKind::Float).unwrap();
        let mut selector = Selector::<f32>::new(vec![0, 2]).unwrap();
        assert!(selector.enter(&[info]).is_err());
        assert!(Selector::<f32>::new(vec![]).is_err());
    }
    #[test]
    fn test_overlapping_frames_rejected() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(100.0, 1, NumericKind::Short).unwrap();
        let source = pipeline.add_source::<i16>(info, 1.0).unwrap();
        let overlapping = SynchronizerConfig::new(0.04).with_delta(0.02);
        let result: Result<Arc<SampleBuffer<f32>>> =
            pipeline.add_transformer(vec![source.clone()], Normalize, overlapping.clone(), 1.0);
        assert!(matches!(result, Err(Error::Config(_))));
        let result: Result<Arc<SampleBuffer<i16>>> = pipeline.add_transformer(
            vec![source.clone()],
            Selector::new(vec![0]).unwrap(),
            overlapping,
            1.0,
        );
        assert!(matches!(result, Err(Error::Config(_))));
        let output: Arc<SampleBuffer<f32>> = pipeline
            .add_transformer(vec![source], Normalize, SynchronizerConfig::new(0.04), 1.0)
            .unwrap();
        assert_eq!(output.sample_rate(), 100.0);
    }
    #[tokio::test]
    async fn test_output_follows_source_rate_change() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(100.0, 1, NumericKind::Float).unwrap();
        let source = pipeline.add_source::<f32>(info, 1.0).unwrap();
        let selected: Arc<SampleBuffer<f32>> = pipeline
            .add_transformer(
                vec![source.clone()],
                Selector::new(vec![0]).unwrap(),
                SynchronizerConfig::new(0.1),
                1.0,
            )
            .unwrap();
        pipeline.start().unwrap();
        let values: Vec<f32> = (0..60).map(|i| i as f32).collect();
        source.write(&values[..20]).unwrap();
        assert!(selected.wait_for(20, &pipeline.stop_token()).await.unwrap());
        // the window of cycle 2 is already pending with the old timing
        source.set_sample_rate(200.0).unwrap();
        source.write(&values[20..]).unwrap();
        source.close();
        pipeline.wait().await.unwrap();
        assert_eq!(selected.sample_rate(), 200.0);
        assert_eq!(selected.write_position(), 50);
        assert_eq!(selected.read_window(0, 50).unwrap(), values[..50].to_vec());
    }
    #[tokio::test]
    async fn test_selector_in_pipeline() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(50.0, 3, NumericKind::Int)
            .unwrap()
            .with_labels(["AccX", "AccY", "AccZ"])
            .unwrap();
        let source = pipeline.add_source::<i32>(info, 1.0).unwrap();
        let selected: Arc<SampleBuffer<i32>> = pipeline
            .add_transformer(
                vec![source.clone()],
                Selector::new(vec![2, 0]).unwrap(),
                SynchronizerConfig::new(0.1),
                1.0,
            )
            .unwrap();
        assert_eq!(selected.sample_rate(), 50.0);
        assert_eq!(selected.info().labels, vec!["AccZ", "AccX"]);
        pipeline.start().unwrap();
        let values: Vec<i32> = (0..30).collect();
        source.write(&values).unwrap();
        source.close();
        pipeline.wait().await.unwrap();
        assert_eq!(
            selected.read_window(0, 10).unwrap(),
            vec![2, 0, 5, 3, 8, 6, 11, 9, 14, 12, 17, 15, 20, 18, 23, 21, 26, 24, 29, 27]
        );
    }
}
