//! Voice mixer shared by the live and offline contexts.
//!
//! Started sources arrive over a channel, wait until their start frame and
//! are summed into the output until their buffer runs out.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver};
use tracing::trace;

use crate::buffer::DecodedBuffer;
use crate::source::{Destination, ScheduledSource};

/// Frames rendered so far, readable from any thread.
#[derive(Debug, Clone)]
pub struct Clock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl Clock {
    fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Seconds rendered so far.
    pub fn seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }
}

/// A started source inside the mixer.
struct Voice {
    id: u64,
    buffer: Arc<DecodedBuffer>,
    start_frame: u64,
    position: usize,
}

impl Voice {
    fn is_finished(&self) -> bool {
        self.position >= self.buffer.frames()
    }

    /// Sample for output channel `channel` at the current position.
    fn sample(&self, channel: usize) -> f32 {
        match self.buffer.channels() {
            1 => self.buffer.sample(self.position, 0),
            n if channel < usize::from(n) => self.buffer.sample(self.position, channel),
            _ => 0.0,
        }
    }
}

/// Sums scheduled voices into interleaved output blocks.
pub struct Mixer {
    rx: Receiver<ScheduledSource>,
    destination: Destination,
    voices: Vec<Voice>,
    sample_rate: u32,
    channels: u16,
    clock: Clock,
}

impl Mixer {
    /// Create a mixer for the given output format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let (tx, rx) = unbounded();
        Self {
            rx,
            destination: Destination::new(tx),
            voices: Vec::new(),
            sample_rate,
            channels: channels.max(1),
            clock: Clock::new(sample_rate),
        }
    }

    /// Destination feeding this mixer.
    pub fn destination(&self) -> Destination {
        self.destination.clone()
    }

    /// Shared handle to the render clock.
    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    /// Get the sample rate.
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of output channels.
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Voices waiting to start or still playing.
    pub fn voice_count(&mut self) -> usize {
        self.accept_sources();
        self.voices.len()
    }

    /// IDs of voices waiting to start or still playing, with their start frame.
    pub fn voices(&mut self) -> Vec<(u64, u64)> {
        self.accept_sources();
        self.voices.iter().map(|v| (v.id, v.start_frame)).collect()
    }

    fn accept_sources(&mut self) {
        while let Ok(source) = self.rx.try_recv() {
            let start_frame = (source.when * f64::from(self.sample_rate)).round() as u64;
            trace!(id = source.id, start_frame, "Voice scheduled");
            self.voices.push(Voice {
                id: source.id,
                buffer: source.buffer,
                start_frame,
                position: 0,
            });
        }
    }

    /// Render one block of interleaved output and advance the clock.
    ///
    /// `output.len()` should be a multiple of the channel count; a trailing
    /// partial frame is left silent.
    pub fn render(&mut self, output: &mut [f32]) {
        self.accept_sources();
        output.fill(0.0);

        let channels = usize::from(self.channels);
        let frames = output.len() / channels;
        let block_start = self.clock.frames();
        let block_end = block_start + frames as u64;

        for voice in &mut self.voices {
            if voice.start_frame >= block_end {
                continue;
            }

            // Voices scheduled in the past start at the top of the block.
            let offset = voice.start_frame.saturating_sub(block_start) as usize;
            for frame in output.chunks_exact_mut(channels).skip(offset) {
                if voice.is_finished() {
                    break;
                }
                for (channel, out) in frame.iter_mut().enumerate() {
                    *out += voice.sample(channel);
                }
                voice.position += 1;
            }
        }

        self.voices.retain(|voice| {
            let done = voice.is_finished();
            if done {
                trace!(id = voice.id, "Voice finished");
            }
            !done
        });

        self.clock.advance(frames as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BufferSource;

    fn start(mixer: &Mixer, buffer: DecodedBuffer, when: f64) -> u64 {
        let mut source = BufferSource::new();
        source.set_buffer(Arc::new(buffer));
        source.connect(&mixer.destination());
        source.start(when).unwrap()
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_voice_starts_at_scheduled_frame() {
        let mut mixer = Mixer::new(1_000, 1);
        start(&mixer, DecodedBuffer::new(vec![0.5; 10], 1_000, 1), 0.004);

        let mut out = vec![0.0; 8];
        mixer.render(&mut out);
        assert_eq!(out, [0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5]);

        let mut out = vec![0.0; 8];
        mixer.render(&mut out);
        assert_eq!(out, [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.0, 0.0]);
        assert_eq!(mixer.voice_count(), 0);
        assert_eq!(mixer.clock().frames(), 16);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_overlapping_voices_sum() {
        let mut mixer = Mixer::new(1_000, 1);
        let buffer = DecodedBuffer::new(vec![0.25; 4], 1_000, 1);
        start(&mixer, buffer.clone(), 0.0);
        start(&mixer, buffer, 0.002);

        let mut out = vec![0.0; 6];
        mixer.render(&mut out);
        assert_eq!(out, [0.25, 0.25, 0.5, 0.5, 0.25, 0.25]);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_past_start_plays_immediately() {
        let mut mixer = Mixer::new(1_000, 1);
        let mut out = vec![0.0; 10];
        mixer.render(&mut out);

        start(&mixer, DecodedBuffer::new(vec![1.0; 2], 1_000, 1), 0.001);
        let mut out = vec![0.0; 4];
        mixer.render(&mut out);
        assert_eq!(out, [1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_channel_mapping() {
        let mut mixer = Mixer::new(1_000, 2);
        start(&mixer, DecodedBuffer::new(vec![0.5], 1_000, 1), 0.0);
        start(&mixer, DecodedBuffer::new(vec![0.0, 0.0, 0.1, 0.2], 1_000, 2), 0.0);

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);
        // Mono feeds both channels; stereo maps channel to channel.
        assert_eq!(out, [0.5, 0.5, 0.1, 0.2]);
    }

    #[test]
    fn test_voices_reports_start_frames() {
        let mut mixer = Mixer::new(48_000, 2);
        let id = start(&mixer, DecodedBuffer::new(vec![0.0; 2], 48_000, 2), 1.5);
        assert_eq!(mixer.voices(), vec![(id, 72_000)]);
        assert!((mixer.clock().seconds() - 0.0).abs() < f64::EPSILON);
    }
}
