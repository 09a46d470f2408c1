//! Decoded, in-memory audio.

use std::sync::Arc;
use std::time::Duration;

/// Interleaved f32 audio ready for playback.
///
/// The sample data sits behind an `Arc` so any number of scheduled sources
/// can share one decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedBuffer {
    /// Create a buffer from interleaved samples.
    ///
    /// A trailing partial frame is dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % usize::from(channels);
        samples.truncate(whole);

        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get the sample rate.
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of channels.
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Playback length at the buffer's own sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    /// Sample at `frame` for `channel`, or silence past the end.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples
            .get(frame * usize::from(self.channels) + channel)
            .copied()
            .unwrap_or(0.0)
    }

    /// Memory used by the sample data.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_duration() {
        let buffer = DecodedBuffer::new(vec![0.0; 96_000], 48_000, 2);
        assert_eq!(buffer.frames(), 48_000);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert_eq!(buffer.memory_size(), 96_000 * 4);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_partial_frame_dropped() {
        let buffer = DecodedBuffer::new(vec![0.1, 0.2, 0.3], 8_000, 2);
        assert_eq!(buffer.frames(), 1);
        assert_eq!(buffer.sample(0, 1), 0.2);
        assert_eq!(buffer.sample(1, 0), 0.0);
    }

    #[test]
    fn test_zero_channels_treated_as_mono() {
        let buffer = DecodedBuffer::new(vec![0.5; 4], 8_000, 0);
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.frames(), 4);
    }
}
