//! Component options given as named key/value pairs
//!
//! Each component has a plain configuration struct implementing [`Options`].
//! Such a struct can be built from string pairs, e.g. as found in a pipeline
//! description:
//!
//! ```
//! use ssj_core::analysis::peaks::PeakConfig;
//! use ssj_core::config::from_pairs;
//!
//! let config: PeakConfig = from_pairs(&[("minDipBetweenPeaks", "2.5")])?;
//! assert_eq!(config.min_dip_between_peaks, 2.5);
//! assert_eq!(config.threshold_voiced_prob, 0.5);
//! # Ok::<(), ssj_core::Error>(())
//! ```

use crate::error::Result;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Configuration struct with documented defaults and a validity check
pub trait Options: DeserializeOwned + Default {
    /// Check option values, returning [`Error::Config`] if invalid
    ///
    /// [`Error::Config`]: crate::Error::Config
    fn validate(&self) -> Result<()>;
}

/// Build and validate options from key/value pairs
///
/// Values are interpreted as JSON where possible (numbers, booleans,
/// `null`, arrays) and as plain strings otherwise. Missing keys take their
/// default values; unknown keys are rejected.
pub fn from_pairs<C: Options>(pairs: &[(&str, &str)]) -> Result<C> {
    let mut map = Map::new();
    for &(key, value) in pairs {
        let value = serde_json::from_str::<Value>(value.trim())
            .unwrap_or_else(|_| Value::String(value.to_string()));
        map.insert(key.to_string(), value);
    }
    let options: C = serde_json::from_value(Value::Object(map))?;
    options.validate()?;
    Ok(options)
}
