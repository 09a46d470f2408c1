//! Load outcome notifications.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crossbeam_channel::Sender;
use sampler_core::{Error, Location};
use tracing::{error, info};

use crate::buffer::DecodedBuffer;

/// Receives the outcome of sample loads.
///
/// `load_failed` is called exactly once per failed load attempt.
pub trait Notifier: Send + Sync + 'static {
    /// A load attempt failed; the sample stays unloaded.
    fn load_failed(&self, location: &Location, error: &Error);

    /// A load attempt succeeded.
    fn loaded(&self, _location: &Location, _buffer: &DecodedBuffer) {}
}

/// Reports load outcomes through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn load_failed(&self, location: &Location, error: &Error) {
        error!(location = %location, "error loading sample: {error}");
    }

    fn loaded(&self, location: &Location, buffer: &DecodedBuffer) {
        info!(
            location = %location,
            channels = buffer.channels(),
            sample_rate = buffer.sample_rate(),
            duration_ms = buffer.duration().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Sample loaded"
        );
    }
}

/// Load outcome delivered over a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    /// The sample at `location` is ready to play.
    Loaded { location: Location, frames: usize },
    /// Loading the sample at `location` failed.
    LoadFailed { location: Location, reason: String },
}

impl SampleEvent {
    /// The location the event refers to.
    pub const fn location(&self) -> &Location {
        match self {
            Self::Loaded { location, .. } | Self::LoadFailed { location, .. } => location,
        }
    }
}

impl Notifier for Sender<SampleEvent> {
    fn load_failed(&self, location: &Location, error: &Error) {
        let _ = self.send(SampleEvent::LoadFailed {
            location: location.clone(),
            reason: error.to_string(),
        });
    }

    fn loaded(&self, location: &Location, buffer: &DecodedBuffer) {
        let _ = self.send(SampleEvent::Loaded {
            location: location.clone(),
            frames: buffer.frames(),
        });
    }
}
