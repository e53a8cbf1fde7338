//! Speech rate from intensity and voicing
//!
//! [`SpeechRate`] consumes two streams, the intensity contour of speech (in
//! dB, e.g. from [`Intensity`]) and a voicing probability, counts the voiced
//! syllable nuclei in each frame and reports the count per second as a
//! [`SpeechRateEvent`].
//!
//! [`Intensity`]: crate::analysis::intensity::Intensity

use crate::analysis::peaks::{filter_voiced, find_peaks, PeakConfig};
use crate::config::Options;
use crate::error::{config_error, Result};
use crate::events::{Event, EventHandlers};
use crate::pipeline::{Component, Consumer};
use crate::samples::{Frame, StreamInfo};

use tracing::debug;

use std::any::Any;
use std::sync::Arc;

/// Result of speech rate analysis for one frame
#[derive(Clone, PartialEq, Debug)]
pub struct SpeechRateEvent {
    /// Voiced syllable nuclei per second
    pub rate: f64,
    /// Number of voiced syllable nuclei
    pub peaks: usize,
    /// Start of the frame in seconds
    pub time: f64,
    /// Duration of the frame in seconds
    pub duration: f64,
}

impl Event for SpeechRateEvent {
    fn name(&self) -> &str {
        "SpeechRate"
    }
    fn text(&self) -> String {
        format!("{:.3}", self.rate)
    }
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

/// Consumer counting voiced syllable nuclei
pub struct SpeechRate {
    config: PeakConfig,
    handlers: EventHandlers,
}

impl SpeechRate {
    /// Create consumer with given peak detection options
    pub fn new(config: PeakConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            handlers: EventHandlers::new(),
        })
    }
    /// Handlers receiving a [`SpeechRateEvent`] per frame
    pub fn event_handlers(&self) -> &EventHandlers {
        &self.handlers
    }
    /// Analyze one intensity frame with its voicing frame
    pub fn analyze(&self, intensity: &Frame<f32>, voicing: &Frame<f32>) -> SpeechRateEvent {
        let signal = intensity.column(0);
        let peaks = find_peaks(
            &signal,
            self.config.threshold_above_median,
            self.config.min_dip_between_peaks,
            self.config.width,
        );
        let voiced = filter_voiced(
            &peaks,
            intensity.sample_rate(),
            &voicing.column(0),
            voicing.sample_rate(),
            self.config.threshold_voiced_prob,
        );
        let duration = intensity.duration();
        SpeechRateEvent {
            rate: if duration > 0.0 {
                voiced.len() as f64 / duration
            } else {
                0.0
            },
            peaks: voiced.len(),
            time: intensity.time(),
            duration,
        }
    }
}

impl Component for SpeechRate {
    fn name(&self) -> &str {
        "SpeechRate"
    }
    fn enter(&mut self, inputs: &[StreamInfo]) -> Result<()> {
        match inputs {
            [intensity, voicing] if intensity.dimension == 1 && voicing.dimension == 1 => Ok(()),
            _ => Err(config_error(
                "SpeechRate expects two one-dimensional inputs (intensity, voicing)",
            )),
        }
    }
}

impl Consumer<f32> for SpeechRate {
    fn consume(&mut self, frames: &[Frame<f32>]) -> Result<()> {
        let [intensity, voicing] = frames else {
            return Err(config_error("SpeechRate expects two input frames"));
        };
        let event = self.analyze(intensity, voicing);
        debug!(
            "speech rate at {:.2} s: {} nuclei, {:.3}/s",
            event.time, event.peaks, event.rate
        );
        self.handlers.invoke(&(Arc::new(event) as Arc<dyn Event>));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbers::NumericKind;
    use crate::pipeline::Pipeline;
    use crate::synchronizer::SynchronizerConfig;
    use parking_lot::Mutex;

    // three syllables per second, 40 dB peaks over a 20 dB floor
    fn syllables(rate: f64, seconds: f64) -> Vec<f32> {
        let n = (rate * seconds) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / rate;
                let phase = (t * 3.0).fract();
                if (phase - 0.5).abs() < 0.2 {
                    (40.0 - 100.0 * (phase - 0.5).abs()) as f32
                } else {
                    20.0
                }
            })
            .collect()
    }

    #[test]
    fn test_analyze_frame() {
        let speech_rate = SpeechRate::new(PeakConfig::default()).unwrap();
        let info = StreamInfo::new(100.0, 1, NumericKind::Float).unwrap();
        let intensity = Frame {
            info: info.clone(),
            start: 0,
            values: syllables(100.0, 2.0),
        };
        let voiced = Frame {
            info: StreamInfo::new(10.0, 1, NumericKind::Float).unwrap(),
            start: 0,
            values: vec![1.0; 20],
        };
        let event = speech_rate.analyze(&intensity, &voiced);
        assert_eq!(event.peaks, 6);
        assert_eq!(event.rate, 3.0);
        assert_eq!(event.text(), "3.000");
        let unvoiced = Frame {
            values: vec![0.2; 20],
            ..voiced
        };
        assert_eq!(speech_rate.analyze(&intensity, &unvoiced).peaks, 0);
    }
    #[tokio::test]
    async fn test_events_from_pipeline() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(100.0, 1, NumericKind::Float).unwrap();
        let intensity = pipeline.add_source::<f32>(info, 5.0).unwrap();
        let info = StreamInfo::new(20.0, 1, NumericKind::Float).unwrap();
        let voicing = pipeline.add_source::<f32>(info, 5.0).unwrap();
        let speech_rate = SpeechRate::new(PeakConfig::default()).unwrap();
        let rates = Arc::new(Mutex::new(Vec::new()));
        let sink = rates.clone();
        speech_rate
            .event_handlers()
            .register(move |event| {
                let event = event.as_any().downcast_ref::<SpeechRateEvent>().unwrap();
                sink.lock().push(event.rate);
            })
            .forget();
        pipeline
            .add_consumer(
                vec![intensity.clone(), voicing.clone()],
                speech_rate,
                SynchronizerConfig::new(1.0),
            )
            .unwrap();
        pipeline.start().unwrap();
        intensity.write(&syllables(100.0, 3.0)).unwrap();
        voicing.write(&[1.0; 60]).unwrap();
        intensity.close();
        voicing.close();
        pipeline.wait().await.unwrap();
        assert_eq!(*rates.lock(), vec![3.0; 3]);
    }
    #[test]
    fn test_enter_requires_two_scalar_inputs() {
        let mut speech_rate = SpeechRate::new(PeakConfig::default()).unwrap();
        let scalar = StreamInfo::new(100.0, 1, NumericKind::Float).unwrap();
        let stereo = StreamInfo::new(100.0, 2, NumericKind::Float).unwrap();
        assert!(speech_rate.enter(&[scalar.clone()]).is_err());
        assert!(speech_rate.enter(&[scalar.clone(), stereo]).is_err());
        assert!(speech_rate.enter(&[scalar.clone(), scalar]).is_ok());
    }
}
