//! Windowed signal analysis
//!
//! The free functions in the submodules operate on one window of samples and
//! never fail on degenerate input; they return documented sentinel values
//! (`0.0` or `-300 dB`) instead. The components wrapping them
//! ([`Intensity`], [`AccelerationFeatures`], [`SpeechRate`], ...) plug into a
//! [`Pipeline`].
//!
//! [`Intensity`]: intensity::Intensity
//! [`AccelerationFeatures`]: features::AccelerationFeatures
//! [`SpeechRate`]: speech_rate::SpeechRate
//! [`Pipeline`]: crate::pipeline::Pipeline

pub mod convert;
pub mod features;
pub mod intensity;
pub mod peaks;
pub mod spectral;
pub mod speech_rate;
pub mod statistics;
