//! Shared helpers for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::io::Cursor;

use bytes::Bytes;
use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use sampler_core::{Error, HttpError, Location, Result};

use crate::transport::{Fetched, Transport};

/// Encode 16-bit PCM frames as an in-memory WAV file.
pub fn wav_bytes<const N: usize>(frames: &[[i16; N]], sample_rate: u32) -> Bytes {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: N as u16,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )
        .unwrap();

        for frame in frames {
            for &sample in frame {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    Bytes::from(cursor.into_inner())
}

/// Mono WAV holding `frames` copies of `value`.
pub fn constant_wav(value: i16, frames: usize, sample_rate: u32) -> Bytes {
    wav_bytes(&vec![[value]; frames], sample_rate)
}

/// Transport serving fixed payloads from memory.
///
/// Unknown locations fail with a 404.
#[derive(Default)]
pub struct MemoryTransport {
    payloads: HashMap<String, Bytes>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: &str, data: Bytes) -> Self {
        self.payloads.insert(location.to_string(), data);
        self
    }

    /// Number of fetches made for `location`.
    pub fn request_count(&self, location: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|requested| requested.as_str() == location)
            .count()
    }
}

impl Transport for MemoryTransport {
    async fn fetch(&self, location: &Location) -> Result<Fetched> {
        self.requests.lock().push(location.to_string());
        tokio::task::yield_now().await;

        self.payloads.get(location.as_str()).map_or_else(
            || {
                Err(Error::Http(HttpError::StatusError {
                    status: 404,
                    message: "Not Found".to_string(),
                }))
            },
            |data| {
                Ok(Fetched {
                    data: data.clone(),
                    mime_type: Some("audio/wav".to_string()),
                })
            },
        )
    }
}
