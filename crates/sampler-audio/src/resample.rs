//! Sample-rate conversion of decoded buffers using rubato.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use rubato::{FftFixedIn, Resampler as RubatoResampler};
use sampler_core::{Error, Result};
use tracing::debug;

use crate::buffer::DecodedBuffer;

/// Requested input chunk size; rubato may round it to suit the rate ratio.
const CHUNK_SIZE: usize = 1024;

/// Upper bound on flush passes after the input is exhausted.
const MAX_FLUSH_PASSES: usize = 8;

/// Converts whole buffers from one sample rate to another.
pub struct Resampler {
    #[allow(clippy::struct_field_names)]
    resampler: FftFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
}

impl Resampler {
    /// Create a new resampler.
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(Error::InvalidArgument(format!(
                "Cannot resample {input_rate}Hz -> {output_rate}Hz with {channels} channels"
            )));
        }

        let resampler = FftFixedIn::new(
            input_rate as usize,
            output_rate as usize,
            CHUNK_SIZE,
            2,
            channels,
        )
        .map_err(|e| Error::AudioDecode(format!("Failed to create resampler: {e}")))?;

        debug!(
            "Resampler created: {}Hz -> {}Hz, {} channels",
            input_rate, output_rate, channels
        );

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            channels,
        })
    }

    /// Check if resampling is needed.
    pub const fn needs_resampling(&self) -> bool {
        self.input_rate != self.output_rate
    }

    /// Get the output sample rate.
    pub const fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Resample interleaved input and return interleaved output.
    ///
    /// The resampler's group delay is trimmed so the output lines up with
    /// the input, and the length is `ceil(frames * output_rate / input_rate)`.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if !self.needs_resampling() {
            return Ok(input.to_vec());
        }

        let planes = self.deinterleave(input);
        let frames = planes[0].len();
        let expected = (frames as f64 * f64::from(self.output_rate) / f64::from(self.input_rate))
            .ceil() as usize;
        let delay = self.resampler.output_delay();

        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); self.channels];

        let chunk_size = self.resampler.input_frames_next();
        let mut pos = 0;
        while frames - pos >= chunk_size {
            let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[pos..pos + chunk_size]).collect();
            let resampled = self
                .resampler
                .process(&chunk, None)
                .map_err(|e| Error::AudioDecode(format!("Resample failed: {e}")))?;
            append(&mut output, resampled);
            pos += chunk_size;
        }

        if pos < frames {
            let tail: Vec<&[f32]> = planes.iter().map(|p| &p[pos..]).collect();
            let resampled = self
                .resampler
                .process_partial(Some(tail.as_slice()), None)
                .map_err(|e| Error::AudioDecode(format!("Resample failed: {e}")))?;
            append(&mut output, resampled);
        }

        let mut passes = 0;
        while output[0].len() < delay + expected && passes < MAX_FLUSH_PASSES {
            let resampled = self
                .resampler
                .process_partial(None::<&[&[f32]]>, None)
                .map_err(|e| Error::AudioDecode(format!("Resample failed: {e}")))?;
            append(&mut output, resampled);
            passes += 1;
        }

        self.resampler.reset();
        Ok(self.interleave(&output, delay, expected))
    }

    /// Resample a decoded buffer to the output rate.
    pub fn process_buffer(&mut self, buffer: &DecodedBuffer) -> Result<DecodedBuffer> {
        let samples = self.process(buffer.samples())?;
        Ok(DecodedBuffer::new(
            samples,
            self.output_rate,
            buffer.channels(),
        ))
    }

    /// Deinterleave input samples into channel planes.
    fn deinterleave(&self, input: &[f32]) -> Vec<Vec<f32>> {
        let frames = input.len() / self.channels;
        let mut planes = vec![Vec::with_capacity(frames); self.channels];

        for frame in input.chunks_exact(self.channels) {
            for (plane, &sample) in planes.iter_mut().zip(frame) {
                plane.push(sample);
            }
        }

        planes
    }

    /// Interleave `frames` frames of planar output starting at `skip`.
    fn interleave(&self, planes: &[Vec<f32>], skip: usize, frames: usize) -> Vec<f32> {
        let available = planes[0].len().saturating_sub(skip);
        let frames = frames.min(available);
        let mut output = Vec::with_capacity(frames * self.channels);

        for frame in skip..skip + frames {
            for plane in planes {
                output.push(plane[frame]);
            }
        }

        output
    }
}

fn append(output: &mut [Vec<f32>], resampled: Vec<Vec<f32>>) {
    for (out, chunk) in output.iter_mut().zip(resampled) {
        out.extend(chunk);
    }
}

/// Convert `buffer` to `target_rate`, returning it unchanged when the rates match.
pub fn resample_to(buffer: DecodedBuffer, target_rate: u32) -> Result<DecodedBuffer> {
    if buffer.sample_rate() == target_rate {
        return Ok(buffer);
    }

    let mut resampler = Resampler::new(
        buffer.sample_rate(),
        target_rate,
        usize::from(buffer.channels()),
    )?;
    resampler.process_buffer(&buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_resampling() {
        let mut resampler = Resampler::new(48000, 48000, 2).unwrap();
        assert!(!resampler.needs_resampling());

        let input = vec![0.5f32; 2048];
        let output = resampler.process(&input).unwrap();
        assert_eq!(output.len(), input.len());
    }

    #[test]
    fn test_invalid_rates() {
        assert!(Resampler::new(0, 48000, 2).is_err());
        assert!(Resampler::new(44100, 48000, 0).is_err());
    }

    #[test]
    fn test_upsample_length() {
        let buffer = DecodedBuffer::new(vec![0.25; 22_050 * 2], 22_050, 2);
        let resampled = resample_to(buffer, 44_100).unwrap();

        assert_eq!(resampled.sample_rate(), 44_100);
        assert_eq!(resampled.channels(), 2);
        assert_eq!(resampled.frames(), 44_100);
    }

    #[test]
    fn test_downsample_short_buffer() {
        // Shorter than one resampler chunk.
        let buffer = DecodedBuffer::new(vec![0.0; 300], 48_000, 1);
        let resampled = resample_to(buffer, 16_000).unwrap();

        assert_eq!(resampled.sample_rate(), 16_000);
        assert_eq!(resampled.frames(), 100);
    }

    #[test]
    fn test_constant_signal_survives() {
        let buffer = DecodedBuffer::new(vec![0.5; 8_000], 8_000, 1);
        let resampled = resample_to(buffer, 12_000).unwrap();

        // Away from the edges a DC signal stays at its level.
        let middle = resampled.sample(resampled.frames() / 2, 0);
        assert!((middle - 0.5).abs() < 0.05, "middle sample was {middle}");
    }

    #[test]
    fn test_matching_rate_is_passthrough() {
        let buffer = DecodedBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 44_100, 2);
        let same = resample_to(buffer.clone(), 44_100).unwrap();
        assert_eq!(same, buffer);
    }
}
