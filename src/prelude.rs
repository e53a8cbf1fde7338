//! Re-export of certain important items

pub use super::buffer::SampleBuffer;
pub use super::config::{from_pairs, Options as _};
pub use super::error::{Error, Result};
pub use super::events::{Event, EventHandlers};
pub use super::numbers::{NumericKind, Sample};
pub use super::pipeline::{Component, Consumer, Pipeline, Transformer};
pub use super::samples::{Frame, StreamInfo};
pub use super::sync::stop::StopToken;
pub use super::synchronizer::{FrameSynchronizer, SynchronizerConfig};
pub use super::windowing::{Kaiser, Rectangular, Window as _};
