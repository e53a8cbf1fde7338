//! Feature vectors of multi-axis motion signals
//!
//! [`AccelerationFeatures`] reduces each frame of an (e.g. three-axis)
//! acceleration stream to one sample holding the enabled [`Feature`]s of
//! every axis, followed by the enabled [`CrossFeature`]s of every axis pair.

use crate::analysis::{spectral, statistics};
use crate::analysis::spectral::Spectrum;
use crate::config::Options;
use crate::error::{config_error, Result};
use crate::pipeline::{Component, Transformer};
use crate::samples::{Frame, StreamInfo};

use serde::{Deserialize, Serialize};

/// Descriptor computed from a single axis
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Feature {
    /// Arithmetic mean
    Mean,
    /// Standard deviation
    StdDev,
    /// Variance
    Variance,
    /// Skewness
    Skew,
    /// Excess kurtosis
    Kurtosis,
    /// Interquartile range
    Iqr,
    /// Mean absolute deviation
    Mad,
    /// Root mean square
    Rms,
    /// Crest factor
    Crest,
    /// Spectral energy
    Energy,
    /// Spectral entropy
    Entropy,
    /// Spectral centroid (bin index)
    Centroid,
    /// Spectral rolloff (bin index)
    Rolloff,
    /// Spectral flux
    Flux,
    /// Doubly integrated acceleration
    Displacement,
    /// Haar-like step filter
    Haar,
}

impl Feature {
    /// All single-axis features in output order
    pub const ALL: [Feature; 16] = [
        Feature::Mean,
        Feature::StdDev,
        Feature::Variance,
        Feature::Skew,
        Feature::Kurtosis,
        Feature::Iqr,
        Feature::Mad,
        Feature::Rms,
        Feature::Crest,
        Feature::Energy,
        Feature::Entropy,
        Feature::Centroid,
        Feature::Rolloff,
        Feature::Flux,
        Feature::Displacement,
        Feature::Haar,
    ];
    /// Name used in output labels
    pub fn name(self) -> &'static str {
        match self {
            Feature::Mean => "Mean",
            Feature::StdDev => "StdDev",
            Feature::Variance => "Variance",
            Feature::Skew => "Skew",
            Feature::Kurtosis => "Kurtosis",
            Feature::Iqr => "Iqr",
            Feature::Mad => "Mad",
            Feature::Rms => "Rms",
            Feature::Crest => "Crest",
            Feature::Energy => "Energy",
            Feature::Entropy => "Entropy",
            Feature::Centroid => "Centroid",
            Feature::Rolloff => "Rolloff",
            Feature::Flux => "Flux",
            Feature::Displacement => "Displacement",
            Feature::Haar => "Haar",
        }
    }
    fn is_spectral(self) -> bool {
        matches!(
            self,
            Feature::Energy | Feature::Entropy | Feature::Centroid | Feature::Rolloff | Feature::Flux
        )
    }
}

/// Descriptor computed from a pair of axes
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CrossFeature {
    /// Pearson correlation
    Correlation,
    /// Product of Haar-like step responses
    HaarCross,
}

impl CrossFeature {
    /// All cross-axis features in output order
    pub const ALL: [CrossFeature; 2] = [CrossFeature::Correlation, CrossFeature::HaarCross];
    /// Name used in output labels
    pub fn name(self) -> &'static str {
        match self {
            CrossFeature::Correlation => "Correlation",
            CrossFeature::HaarCross => "HaarCross",
        }
    }
}

/// Selection of computed features (all enabled by default)
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct FeatureFlags {
    pub mean: bool,
    pub std_dev: bool,
    pub variance: bool,
    pub skew: bool,
    pub kurtosis: bool,
    pub iqr: bool,
    pub mad: bool,
    pub rms: bool,
    pub crest: bool,
    pub energy: bool,
    pub entropy: bool,
    pub centroid: bool,
    pub rolloff: bool,
    pub flux: bool,
    pub displacement: bool,
    pub haar: bool,
    pub correlation: bool,
    pub haar_cross: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::all(true)
    }
}

impl FeatureFlags {
    /// All features enabled or all disabled
    pub fn all(enabled: bool) -> Self {
        Self {
            mean: enabled,
            std_dev: enabled,
            variance: enabled,
            skew: enabled,
            kurtosis: enabled,
            iqr: enabled,
            mad: enabled,
            rms: enabled,
            crest: enabled,
            energy: enabled,
            entropy: enabled,
            centroid: enabled,
            rolloff: enabled,
            flux: enabled,
            displacement: enabled,
            haar: enabled,
            correlation: enabled,
            haar_cross: enabled,
        }
    }
    /// Whether a single-axis feature is enabled
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Mean => self.mean,
            Feature::StdDev => self.std_dev,
            Feature::Variance => self.variance,
            Feature::Skew => self.skew,
            Feature::Kurtosis => self.kurtosis,
            Feature::Iqr => self.iqr,
            Feature::Mad => self.mad,
            Feature::Rms => self.rms,
            Feature::Crest => self.crest,
            Feature::Energy => self.energy,
            Feature::Entropy => self.entropy,
            Feature::Centroid => self.centroid,
            Feature::Rolloff => self.rolloff,
            Feature::Flux => self.flux,
            Feature::Displacement => self.displacement,
            Feature::Haar => self.haar,
        }
    }
    /// Whether a cross-axis feature is enabled
    pub fn is_cross_enabled(&self, feature: CrossFeature) -> bool {
        match feature {
            CrossFeature::Correlation => self.correlation,
            CrossFeature::HaarCross => self.haar_cross,
        }
    }
    /// Enabled single-axis features in output order
    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|&f| self.is_enabled(f))
    }
    /// Enabled cross-axis features in output order
    pub fn cross_features(&self) -> impl Iterator<Item = CrossFeature> + '_ {
        CrossFeature::ALL
            .into_iter()
            .filter(|&f| self.is_cross_enabled(f))
    }
    /// Number of output values for `axes` axes
    pub fn output_dimension(&self, axes: usize) -> usize {
        let pairs = axes * axes.saturating_sub(1) / 2;
        axes * self.features().count() + pairs * self.cross_features().count()
    }
}

impl Options for FeatureFlags {
    fn validate(&self) -> Result<()> {
        if self.features().next().is_none() && self.cross_features().next().is_none() {
            return Err(config_error("no feature enabled"));
        }
        Ok(())
    }
}

fn axis_pairs(axes: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..axes).flat_map(move |a| (a + 1..axes).map(move |b| (a, b)))
}

/// Component computing statistical and spectral features per frame
pub struct AccelerationFeatures {
    flags: FeatureFlags,
    spectrum: Spectrum,
    magnitudes: Vec<f32>,
}

impl AccelerationFeatures {
    /// Create component computing the selected features
    pub fn new(flags: FeatureFlags) -> Result<Self> {
        flags.validate()?;
        Ok(Self {
            flags,
            spectrum: Spectrum::new(),
            magnitudes: Vec::new(),
        })
    }
    /// Compute the enabled features of one axis
    pub fn axis_features(&mut self, axis: &[f32], sample_rate: f64, output: &mut Vec<f32>) {
        if self.flags.features().any(Feature::is_spectral) {
            self.spectrum.magnitudes_into(axis, &mut self.magnitudes);
        }
        let magnitudes = &self.magnitudes;
        output.extend(self.flags.features().map(|feature| match feature {
            Feature::Mean => statistics::mean(axis),
            Feature::StdDev => statistics::std_dev(axis),
            Feature::Variance => statistics::variance(axis),
            Feature::Skew => statistics::skew(axis),
            Feature::Kurtosis => statistics::kurtosis(axis),
            Feature::Iqr => statistics::iqr(axis),
            Feature::Mad => statistics::mad(axis),
            Feature::Rms => statistics::rms(axis),
            Feature::Crest => statistics::crest(axis),
            Feature::Energy => spectral::energy(magnitudes),
            Feature::Entropy => spectral::entropy(magnitudes),
            Feature::Centroid => spectral::centroid(magnitudes),
            Feature::Rolloff => spectral::rolloff(magnitudes),
            Feature::Flux => spectral::flux(magnitudes),
            Feature::Displacement => statistics::displacement(axis, sample_rate),
            Feature::Haar => statistics::haar(axis),
        }));
    }
}

impl Component for AccelerationFeatures {
    fn name(&self) -> &str {
        "AccelerationFeatures"
    }
    fn enter(&mut self, inputs: &[StreamInfo]) -> Result<()> {
        let [_] = inputs else {
            return Err(config_error(
                "AccelerationFeatures expects exactly one input stream",
            ));
        };
        Ok(())
    }
}

impl Transformer<f32, f32> for AccelerationFeatures {
    fn output_dimension(&self, inputs: &[StreamInfo]) -> usize {
        self.flags
            .output_dimension(inputs.first().map_or(0, |info| info.dimension))
    }
    fn output_labels(&self, inputs: &[StreamInfo]) -> Vec<String> {
        let Some(input) = inputs.first() else {
            return Vec::new();
        };
        let labels = &input.labels;
        let mut output = Vec::new();
        for label in labels {
            output.extend(self.flags.features().map(|f| format!("{}_{}", label, f.name())));
        }
        for (a, b) in axis_pairs(labels.len()) {
            output.extend(
                self.flags
                    .cross_features()
                    .map(|f| format!("{}{}_{}", labels[a], labels[b], f.name())),
            );
        }
        output
    }
    fn transform(&mut self, frames: &[Frame<f32>], output: &mut Vec<f32>) -> Result<()> {
        let frame = &frames[0];
        let columns: Vec<Vec<f32>> = (0..frame.dimension()).map(|d| frame.column(d)).collect();
        for column in &columns {
            self.axis_features(column, frame.sample_rate(), output);
        }
        for (a, b) in axis_pairs(columns.len()) {
            let (x, y) = (&columns[a], &columns[b]);
            output.extend(self.flags.cross_features().map(|feature| match feature {
                CrossFeature::Correlation => statistics::correlation(x, y),
                CrossFeature::HaarCross => statistics::haar_cross(x, y),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_pairs;
    use crate::numbers::NumericKind;

    fn xyz() -> StreamInfo {
        StreamInfo::new(50.0, 3, NumericKind::Float)
            .unwrap()
            .with_labels(["AccX", "AccY", "AccZ"])
            .unwrap()
    }

    #[test]
    fn test_labels_and_dimension() {
        let features = AccelerationFeatures::new(FeatureFlags::default()).unwrap();
        let inputs = [xyz()];
        assert_eq!(features.output_dimension(&inputs), 3 * 16 + 3 * 2);
        let labels = features.output_labels(&inputs);
        assert_eq!(labels.len(), 54);
        assert_eq!(labels[0], "AccX_Mean");
        assert_eq!(labels[16], "AccY_Mean");
        assert_eq!(labels[48], "AccXAccY_Correlation");
        assert_eq!(labels[53], "AccYAccZ_HaarCross");
    }
    #[test]
    fn test_selected_features() {
        let flags: FeatureFlags = from_pairs(&[
            ("mean", "true"),
            ("rms", "true"),
            ("centroid", "true"),
            ("correlation", "true"),
        ])
        .unwrap();
        assert_eq!(flags, FeatureFlags::default());
        let mut flags = FeatureFlags::all(false);
        flags.mean = true;
        flags.centroid = true;
        flags.correlation = true;
        let mut features = AccelerationFeatures::new(flags).unwrap();
        let info = xyz();
        assert_eq!(
            features.output_labels(&[info.clone()]),
            vec![
                "AccX_Mean",
                "AccX_Centroid",
                "AccY_Mean",
                "AccY_Centroid",
                "AccZ_Mean",
                "AccZ_Centroid",
                "AccXAccY_Correlation",
                "AccXAccZ_Correlation",
                "AccYAccZ_Correlation",
            ]
        );
        let values: Vec<f32> = (0..32)
            .flat_map(|i| {
                let x = (2.0 * std::f32::consts::PI * 4.0 * i as f32 / 32.0).cos();
                [x + 1.0, 2.0 * x, -x]
            })
            .collect();
        let frame = Frame {
            info,
            start: 0,
            values,
        };
        let mut output = Vec::new();
        features.transform(&[frame], &mut output).unwrap();
        assert_eq!(output.len(), 9);
        assert!((output[0] - 1.0).abs() < 1e-5);
        assert!((output[2]).abs() < 1e-5);
        assert!((output[3] - 4.0).abs() < 1e-3);
        assert!((output[6] - 1.0).abs() < 1e-5);
        assert!((output[7] + 1.0).abs() < 1e-5);
    }
    #[test]
    fn test_no_features_rejected() {
        assert!(AccelerationFeatures::new(FeatureFlags::all(false)).is_err());
    }
}
