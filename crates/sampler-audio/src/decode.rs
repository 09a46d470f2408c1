//! Audio decoding using symphonia.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::io::Cursor;

use bytes::Bytes;
use sampler_core::{Error, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, trace, warn};

use crate::buffer::DecodedBuffer;

/// Decode a complete in-memory payload into a [`DecodedBuffer`].
///
/// `hint` may be a MIME type (`audio/wav`) or a file extension (`wav`).
pub fn decode_bytes(data: Bytes, hint: Option<&str>) -> Result<DecodedBuffer> {
    let mut decoder = PayloadDecoder::from_bytes(data, hint)?;
    decoder.decode_all()
}

/// Map a MIME type or extension to the extension symphonia probes with.
fn extension_hint(hint: &str) -> Option<&str> {
    let hint = hint.trim();
    if !hint.contains('/') {
        return (!hint.is_empty()).then_some(hint);
    }

    if hint.contains("wav") || hint.contains("wave") {
        Some("wav")
    } else if hint.contains("webm") || hint.contains("opus") {
        Some("webm")
    } else if hint.contains("mp4") || hint.contains("m4a") || hint.contains("aac") {
        Some("m4a")
    } else if hint.contains("mp3") || hint.contains("mpeg") {
        Some("mp3")
    } else if hint.contains("ogg") || hint.contains("vorbis") {
        Some("ogg")
    } else if hint.contains("flac") {
        Some("flac")
    } else if hint.contains("aiff") {
        Some("aiff")
    } else {
        None
    }
}

/// Symphonia format reader and decoder for one payload.
struct PayloadDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: Option<u32>,
    channels: Option<u16>,
}

impl PayloadDecoder {
    fn from_bytes(data: Bytes, hint: Option<&str>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::AudioDecode("Empty payload".to_string()));
        }

        let mss = MediaSourceStream::new(
            Box::new(Cursor::new(data)),
            MediaSourceStreamOptions::default(),
        );

        let mut probe_hint = Hint::new();
        if let Some(ext) = hint.and_then(extension_hint) {
            probe_hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(&probe_hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| Error::UnsupportedFormat(format!("Failed to probe format: {e}")))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::AudioDecode("No audio tracks found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate;
        let channels = track.codec_params.channels.map(|c| c.count() as u16);

        debug!(
            track_id,
            ?sample_rate,
            ?channels,
            codec = ?track.codec_params.codec,
            "Probed audio payload"
        );

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::UnsupportedFormat(format!("Failed to create decoder: {e}")))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    /// Decode every packet of the selected track.
    fn decode_all(&mut self) -> Result<DecodedBuffer> {
        let mut samples = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Failed to read packet: {e}")));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt frame: {e}");
                    continue;
                }
                Err(e) => return Err(Error::AudioDecode(format!("Decode failed: {e}"))),
            };

            let spec = *decoded.spec();
            self.sample_rate.get_or_insert(spec.rate);
            self.channels.get_or_insert(spec.channels.count() as u16);

            let needed = decoded.capacity() * spec.channels.count();
            if scratch.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = scratch.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
            trace!("Decoded {} samples", buf.samples().len());
        }

        if samples.is_empty() {
            return Err(Error::AudioDecode("Payload contains no audio frames".to_string()));
        }

        let sample_rate = self
            .sample_rate
            .ok_or_else(|| Error::AudioDecode("Unknown sample rate".to_string()))?;
        let channels = self.channels.unwrap_or(1);

        Ok(DecodedBuffer::new(samples, sample_rate, channels))
    }
}
