//! # sampler-audio
//!
//! Audio samples that are fetched once, decoded into memory and played on
//! an audio context's clock.
//!
//! Features:
//! - HTTP and local-file loading through a pluggable [`Transport`]
//! - Symphonia decoding with rubato conversion to the context sample rate
//! - Sample-accurate scheduling of overlapping one-shot sources
//! - Live cpal output and offline rendering behind one [`AudioContext`] trait

pub mod buffer;
pub mod context;
pub mod decode;
pub mod mixer;
pub mod notify;
pub mod offline;
pub mod output;
pub mod resample;
pub mod sample;
pub mod source;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use buffer::DecodedBuffer;
pub use context::AudioContext;
pub use notify::{LogNotifier, Notifier, SampleEvent};
pub use offline::OfflineContext;
pub use output::CpalContext;
pub use sample::{LoadStatus, Sample};
pub use source::{BufferSource, Destination};
pub use transport::{Fetched, HttpTransport, Transport};
