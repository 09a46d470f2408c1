//! One-shot buffer sources and the destination they connect to.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use sampler_core::{Error, Result};
use tracing::trace;

use crate::buffer::DecodedBuffer;

/// Global destination ID counter.
static NEXT_DESTINATION_ID: AtomicU64 = AtomicU64::new(1);

/// Global source ID counter.
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// A started source on its way to the mixer.
#[derive(Debug, Clone)]
pub struct ScheduledSource {
    /// Unique ID of the source that was started.
    pub id: u64,
    /// Audio to render.
    pub buffer: Arc<DecodedBuffer>,
    /// Start time in seconds on the context clock.
    pub when: f64,
}

/// Output sink of an audio context.
///
/// Cloning yields another handle to the same sink.
#[derive(Debug, Clone)]
pub struct Destination {
    id: u64,
    tx: Sender<ScheduledSource>,
}

impl Destination {
    /// Create a destination feeding `tx`.
    pub fn new(tx: Sender<ScheduledSource>) -> Self {
        Self {
            id: NEXT_DESTINATION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }

    /// Identity of the underlying sink.
    pub const fn id(&self) -> u64 {
        self.id
    }

    fn submit(&self, source: ScheduledSource) -> Result<()> {
        self.tx
            .send(source)
            .map_err(|_| Error::AudioOutput("Destination is no longer accepting sources".to_string()))
    }
}

impl PartialEq for Destination {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Destination {}

/// A one-shot playable handle for a decoded buffer.
///
/// Set a buffer, connect it, then [`start`](Self::start) it once.
#[derive(Debug, Default)]
pub struct BufferSource {
    buffer: Option<Arc<DecodedBuffer>>,
    destination: Option<Destination>,
}

impl BufferSource {
    /// Create an empty, unconnected source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the buffer to play.
    pub fn set_buffer(&mut self, buffer: Arc<DecodedBuffer>) {
        self.buffer = Some(buffer);
    }

    /// The bound buffer.
    pub fn buffer(&self) -> Option<&Arc<DecodedBuffer>> {
        self.buffer.as_ref()
    }

    /// Route this source to `destination`.
    pub fn connect(&mut self, destination: &Destination) {
        self.destination = Some(destination.clone());
    }

    /// The destination this source is connected to.
    pub const fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    /// Schedule playback at `when` seconds on the context clock.
    ///
    /// Returns the ID the mixer knows the source by.
    pub fn start(self, when: f64) -> Result<u64> {
        let buffer = self
            .buffer
            .ok_or_else(|| Error::InvalidArgument("Buffer source has no buffer".to_string()))?;
        let destination = self
            .destination
            .ok_or_else(|| Error::InvalidArgument("Buffer source is not connected".to_string()))?;

        if !when.is_finite() {
            return Err(Error::InvalidArgument(format!("Invalid start time: {when}")));
        }

        let id = NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed);
        trace!(id, when, frames = buffer.frames(), "Starting buffer source");

        destination.submit(ScheduledSource {
            id,
            buffer,
            when: when.max(0.0),
        })?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn buffer() -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::new(vec![0.5; 16], 8_000, 1))
    }

    #[test]
    fn test_start_delivers_to_destination() {
        let (tx, rx) = unbounded();
        let destination = Destination::new(tx);

        let mut source = BufferSource::new();
        source.set_buffer(buffer());
        source.connect(&destination);
        assert_eq!(source.destination(), Some(&destination));

        let id = source.start(1.5).unwrap();
        let scheduled = rx.try_recv().unwrap();
        assert_eq!(scheduled.id, id);
        assert!((scheduled.when - 1.5).abs() < f64::EPSILON);
        assert_eq!(scheduled.buffer.frames(), 16);
    }

    #[test]
    fn test_start_requires_buffer_and_destination() {
        let (tx, _rx) = unbounded();
        let destination = Destination::new(tx);

        let mut unbuffered = BufferSource::new();
        unbuffered.connect(&destination);
        assert!(matches!(unbuffered.start(0.0), Err(Error::InvalidArgument(_))));

        let mut unconnected = BufferSource::new();
        unconnected.set_buffer(buffer());
        assert!(matches!(unconnected.start(0.0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_start_after_mixer_gone() {
        let (tx, rx) = unbounded();
        let destination = Destination::new(tx);
        drop(rx);

        let mut source = BufferSource::new();
        source.set_buffer(buffer());
        source.connect(&destination);
        assert!(matches!(source.start(0.0), Err(Error::AudioOutput(_))));
    }

    #[test]
    fn test_destination_identity() {
        let (tx, _rx) = unbounded();
        let a = Destination::new(tx.clone());
        let b = Destination::new(tx);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
