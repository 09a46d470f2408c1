//! The audio context abstraction samples decode and play through.

use bytes::Bytes;
use sampler_core::Result;
use tracing::debug;

use crate::buffer::DecodedBuffer;
use crate::decode::decode_bytes;
use crate::resample::resample_to;
use crate::source::{BufferSource, Destination};

/// Decoding, source creation, output routing and a scheduling clock.
///
/// Implementations must be shareable across threads: samples decode on the
/// blocking pool and schedule from whichever thread calls `play`.
pub trait AudioContext: Send + Sync + 'static {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of output channels.
    fn channels(&self) -> u16;

    /// Seconds of audio rendered so far. Start times are given on this clock.
    fn current_time(&self) -> f64;

    /// The sink sources connect to.
    fn destination(&self) -> Destination;

    /// Create a new, unconnected one-shot source.
    fn create_buffer_source(&self) -> BufferSource {
        BufferSource::new()
    }

    /// Decode a raw payload and convert it to this context's sample rate.
    fn decode_audio_data(&self, data: Bytes, hint: Option<&str>) -> Result<DecodedBuffer> {
        let decoded = decode_bytes(data, hint)?;
        debug!(
            frames = decoded.frames(),
            source_rate = decoded.sample_rate(),
            target_rate = self.sample_rate(),
            channels = decoded.channels(),
            "Decoded audio data"
        );
        resample_to(decoded, self.sample_rate())
    }
}
