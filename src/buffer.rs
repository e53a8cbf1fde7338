//! Fixed-capacity circular storage for one sample stream
//!
//! A [`SampleBuffer`] is owned by the component producing the stream (the
//! only writer) and shared with any number of readers through an [`Arc`].
//! Samples are addressed by their absolute index since the stream started;
//! the buffer retains the most recent [`capacity`] samples.
//!
//! Readers that need data to stay available register a [`ReadCursor`]. A
//! write that would overwrite samples at or after the slowest cursor fails
//! with [`Error::Overflow`] instead of silently wrapping. Reads past the
//! write position fail with [`Error::Underrun`]; reads of evicted samples
//! fail with [`Error::NotAvailable`].
//!
//! # Example
//!
//! ```
//! use ssj_core::buffer::SampleBuffer;
//! use ssj_core::numbers::NumericKind;
//! use ssj_core::samples::StreamInfo;
//!
//! let info = StreamInfo::new(50.0, 3, NumericKind::Float)?;
//! let buffer = SampleBuffer::<f32>::new(info, 100)?;
//! buffer.write(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6])?;
//! assert_eq!(buffer.read_window(1, 1)?, vec![0.4, 0.5, 0.6]);
//! # Ok::<(), ssj_core::Error>(())
//! ```
//!
//! [`capacity`]: SampleBuffer::capacity

use crate::error::{config_error, Error, Result};
use crate::numbers::*;
use crate::samples::StreamInfo;
use crate::sync::stop::StopToken;

use parking_lot::{Mutex, RwLock};
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, trace};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

struct Ring<T> {
    values: Vec<T>,
    written: u64,
}

#[derive(Default)]
struct CursorRegistry {
    cursors: Vec<(u64, u64)>,
    next_id: u64,
}

impl CursorRegistry {
    fn minimum(&self) -> Option<u64> {
        self.cursors.iter().map(|&(_, position)| position).min()
    }
}

/// Circular buffer holding the most recent samples of one stream
pub struct SampleBuffer<T> {
    info: StreamInfo,
    sample_rate: AtomicU64,
    capacity: usize,
    ring: RwLock<Ring<T>>,
    readers: Arc<Mutex<CursorRegistry>>,
    position: watch::Sender<u64>,
    closed: AtomicBool,
}

impl<T: Sample> SampleBuffer<T> {
    /// Create buffer holding up to `capacity` samples of the described stream
    pub fn new(info: StreamInfo, capacity: usize) -> Result<Self> {
        if info.kind != T::KIND {
            return Err(config_error(format!(
                "stream kind {:?} does not match buffer kind {:?}",
                info.kind,
                T::KIND
            )));
        }
        if capacity == 0 {
            return Err(config_error("buffer capacity must be positive"));
        }
        StreamInfo::new(info.sample_rate, info.dimension, info.kind)?;
        debug!(
            "allocating sample buffer: {} samples x {} ({:?}) at {} Hz",
            capacity, info.dimension, info.kind, info.sample_rate
        );
        Ok(Self {
            sample_rate: AtomicU64::new(info.sample_rate.to_bits()),
            capacity,
            ring: RwLock::new(Ring {
                values: vec![T::default(); capacity * info.dimension],
                written: 0,
            }),
            readers: Default::default(),
            position: watch::channel(0).0,
            closed: AtomicBool::new(false),
            info,
        })
    }
    /// Create buffer holding `seconds` worth of samples
    pub fn with_duration(info: StreamInfo, seconds: f64) -> Result<Self> {
        let capacity = info.samples_for(seconds) as usize;
        Self::new(info, capacity)
    }
    /// Append samples (interleaved, a multiple of [`dimension`] values)
    ///
    /// Returns the new write position. Nothing is written if an error is
    /// returned.
    ///
    /// [`dimension`]: Self::dimension
    pub fn write(&self, samples: &[T]) -> Result<u64> {
        let dim = self.info.dimension;
        if samples.len() % dim != 0 {
            return Err(Error::InvalidInput(format!(
                "{} values is not a multiple of dimension {}",
                samples.len(),
                dim
            )));
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        let n = samples.len() / dim;
        let cap = self.capacity;
        let mut ring = self.ring.write();
        let position = ring.written;
        let reader = self.readers.lock().minimum();
        let overrun = match reader {
            Some(reader) => position + n as u64 > reader + cap as u64,
            None => false,
        };
        if n > cap || overrun {
            return Err(Error::Overflow {
                requested: n,
                position,
                reader: reader.unwrap_or(position),
                capacity: cap,
            });
        }
        let slot = (position % cap as u64) as usize;
        let first = n.min(cap - slot);
        ring.values[slot * dim..(slot + first) * dim].copy_from_slice(&samples[..first * dim]);
        ring.values[..(n - first) * dim].copy_from_slice(&samples[first * dim..]);
        ring.written += n as u64;
        let written = ring.written;
        drop(ring);
        self.position.send_replace(written);
        trace!("wrote {} samples, write position {}", n, written);
        Ok(written)
    }
    /// Copy `count` samples starting at absolute index `start`
    pub fn read_window(&self, start: u64, count: usize) -> Result<Vec<T>> {
        let mut output = Vec::with_capacity(count * self.info.dimension);
        self.read_window_into(start, count, &mut output)?;
        Ok(output)
    }
    /// Same as [`read_window`] but reuses the given vector
    ///
    /// [`read_window`]: Self::read_window
    pub fn read_window_into(&self, start: u64, count: usize, output: &mut Vec<T>) -> Result<()> {
        let dim = self.info.dimension;
        let cap = self.capacity;
        let ring = self.ring.read();
        let written = ring.written;
        let oldest = written.saturating_sub(cap as u64);
        let Some(end) = start.checked_add(count as u64) else {
            return Err(Error::NotAvailable {
                start,
                count,
                oldest,
            });
        };
        if count > cap {
            return Err(Error::NotAvailable {
                start,
                count,
                oldest,
            });
        }
        if end > written {
            return Err(Error::Underrun {
                start,
                count,
                written,
            });
        }
        if start < oldest {
            return Err(Error::NotAvailable {
                start,
                count,
                oldest,
            });
        }
        output.clear();
        output.reserve(count * dim);
        let slot = (start % cap as u64) as usize;
        let first = count.min(cap - slot);
        output.extend_from_slice(&ring.values[slot * dim..(slot + first) * dim]);
        output.extend_from_slice(&ring.values[..(count - first) * dim]);
        Ok(())
    }
    /// Register a reader whose cursor starts at `position`
    ///
    /// While the returned [`ReadCursor`] is alive, writes never overwrite
    /// samples at or after its position.
    pub fn register_reader(&self, position: u64) -> ReadCursor {
        let mut registry = self.readers.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.cursors.push((id, position));
        drop(registry);
        ReadCursor {
            registry: Arc::downgrade(&self.readers),
            id,
        }
    }
    /// Wait until `position` samples have been written
    ///
    /// Returns `Ok(false)` if `stop` was signalled first and
    /// [`Error::Closed`] if the buffer is closed before.
    pub async fn wait_for(&self, position: u64, stop: &StopToken) -> Result<bool> {
        let mut rx = self.position.subscribe();
        loop {
            if *rx.borrow_and_update() >= position {
                return Ok(true);
            }
            if self.is_closed() {
                return Err(Error::Closed);
            }
            select! {
                result = rx.changed() => {
                    if result.is_err() {
                        return Err(Error::Closed);
                    }
                }
                _ = stop.stopped() => return Ok(false),
            }
        }
    }
    /// Release the buffer: further writes fail and waiting readers wake up
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("closing sample buffer at position {}", self.write_position());
            self.position.send_modify(|_| ());
        }
    }
    /// Whether [`close`] has been called
    ///
    /// [`close`]: Self::close
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
    /// Change the sample rate of the stream
    ///
    /// Streams are not expected to change rate; readers pick the new rate up
    /// on their next cycle without correcting windows already read.
    pub fn set_sample_rate(&self, sample_rate: f64) -> Result<()> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(config_error(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        self.sample_rate
            .store(sample_rate.to_bits(), Ordering::Release);
        Ok(())
    }
}

impl<T> SampleBuffer<T> {
    /// Capacity in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Current sample rate
    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate.load(Ordering::Acquire))
    }
    /// Values per sample
    pub fn dimension(&self) -> usize {
        self.info.dimension
    }
    /// Numeric kind of the values
    pub fn kind(&self) -> NumericKind {
        self.info.kind
    }
    /// Stream description (with the current sample rate)
    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            sample_rate: self.sample_rate(),
            ..self.info.clone()
        }
    }
    /// Total number of samples written so far
    pub fn write_position(&self) -> u64 {
        *self.position.borrow()
    }
    /// Index of the oldest sample still retained
    pub fn oldest_position(&self) -> u64 {
        self.write_position().saturating_sub(self.capacity as u64)
    }
    /// Minimum cursor of all registered readers
    pub fn min_reader_position(&self) -> Option<u64> {
        self.readers.lock().minimum()
    }
}

/// Read cursor registered with a [`SampleBuffer`]
///
/// The cursor is unregistered when dropped.
#[must_use]
pub struct ReadCursor {
    registry: Weak<Mutex<CursorRegistry>>,
    id: u64,
}

impl ReadCursor {
    /// Move the cursor forward (a smaller `position` is ignored)
    pub fn advance_to(&self, position: u64) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock();
            if let Some(entry) = registry.cursors.iter_mut().find(|(id, _)| *id == self.id) {
                entry.1 = entry.1.max(position);
            }
        }
    }
    /// Current position (`None` if the buffer is gone)
    pub fn position(&self) -> Option<u64> {
        let registry = self.registry.upgrade()?;
        let registry = registry.lock();
        registry
            .cursors
            .iter()
            .find(|(id, _)| *id == self.id)
            .map(|&(_, position)| position)
    }
}

impl Drop for ReadCursor {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().cursors.retain(|(id, _)| *id != self.id);
        }
    }
}
