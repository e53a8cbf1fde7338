//! Buffered multi-rate sample streams for sensor processing pipelines
//!
//! **Note:** This crate is in an early alpha stage.
//!
//! Sensors push raw samples into a [`SampleBuffer`]. A [`FrameSynchronizer`]
//! pulls time-aligned frames from buffers running at different sample rates,
//! and the components in [`analysis`] turn those frames into new streams or
//! [events]. For getting started, have a look at the [`pipeline`] module.
//!
//! [`SampleBuffer`]: buffer::SampleBuffer
//! [`FrameSynchronizer`]: synchronizer::FrameSynchronizer
//! [events]: events

#![warn(missing_docs)]

pub mod analysis;
pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod math;
pub mod numbers;
pub mod pipeline;
pub mod prelude;
pub mod samples;
pub mod sync;
pub mod synchronizer;
pub mod windowing;

pub use error::{Error, Result};
