//! Offline audio context rendering into memory.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use parking_lot::Mutex;

use crate::context::AudioContext;
use crate::mixer::{Clock, Mixer};
use crate::source::Destination;

/// Audio context that renders on demand instead of to a device.
///
/// Time only advances when [`render`](Self::render) is called, which makes
/// scheduling deterministic.
pub struct OfflineContext {
    mixer: Mutex<Mixer>,
    destination: Destination,
    clock: Clock,
    sample_rate: u32,
    channels: u16,
}

impl OfflineContext {
    /// Create an offline context with the given output format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let mixer = Mixer::new(sample_rate, channels);
        let destination = mixer.destination();
        let clock = mixer.clock();
        let channels = mixer.channels();

        Self {
            mixer: Mutex::new(mixer),
            destination,
            clock,
            sample_rate,
            channels,
        }
    }

    /// Render `frames` frames of interleaved output.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * usize::from(self.channels)];
        self.mixer.lock().render(&mut output);
        output
    }

    /// Render until every scheduled voice has finished, capped at `max_frames`.
    pub fn render_to_end(&self, max_frames: usize) -> Vec<f32> {
        const BLOCK: usize = 1024;

        let mut output = Vec::new();
        let mut rendered = 0;
        while rendered < max_frames && self.scheduled_count() > 0 {
            let frames = BLOCK.min(max_frames - rendered);
            output.extend(self.render(frames));
            rendered += frames;
        }
        output
    }

    /// Voices that are scheduled or still playing.
    pub fn scheduled_count(&self) -> usize {
        self.mixer.lock().voice_count()
    }

    /// `(source id, start time in seconds)` of scheduled or playing voices.
    pub fn scheduled(&self) -> Vec<(u64, f64)> {
        self.mixer
            .lock()
            .voices()
            .into_iter()
            .map(|(id, frame)| (id, frame as f64 / f64::from(self.sample_rate)))
            .collect()
    }
}

impl AudioContext for OfflineContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn current_time(&self) -> f64 {
        self.clock.seconds()
    }

    fn destination(&self) -> Destination {
        self.destination.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DecodedBuffer;
    use std::sync::Arc;

    #[test]
    fn test_clock_advances_with_render() {
        let ctx = OfflineContext::new(1_000, 2);
        assert!(ctx.current_time().abs() < f64::EPSILON);

        let out = ctx.render(250);
        assert_eq!(out.len(), 500);
        assert!((ctx.current_time() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_render_to_end() {
        let ctx = OfflineContext::new(1_000, 1);
        let mut source = ctx.create_buffer_source();
        source.set_buffer(Arc::new(DecodedBuffer::new(vec![0.5; 1500], 1_000, 1)));
        source.connect(&ctx.destination());
        source.start(0.5).unwrap();

        let out = ctx.render_to_end(10_000);
        assert_eq!(out.len(), 2048);
        assert!(out[..500].iter().all(|s| s.abs() < f32::EPSILON));
        assert!(out[500..2000].iter().all(|s| (s - 0.5).abs() < f32::EPSILON));
        assert_eq!(ctx.scheduled_count(), 0);
    }

    #[test]
    fn test_render_to_end_respects_cap() {
        let ctx = OfflineContext::new(1_000, 1);
        let mut source = ctx.create_buffer_source();
        source.set_buffer(Arc::new(DecodedBuffer::new(vec![0.5; 5000], 1_000, 1)));
        source.connect(&ctx.destination());
        source.start(0.0).unwrap();

        let out = ctx.render_to_end(100);
        assert_eq!(out.len(), 100);
        assert_eq!(ctx.scheduled_count(), 1);
    }
}
