//! Load a set of samples against one context and schedule them in sequence.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use sampler_audio::{AudioContext, CpalContext, HttpTransport, OfflineContext, Sample};
use sampler_core::Location;
use tracing::{debug, info, warn};

/// Extra wall-clock time allowed past the last scheduled sample.
const PLAYBACK_GRACE: Duration = Duration::from_secs(2);

/// How often live playback polls the context clock.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Samples sharing one transport and one audio context.
pub struct Session<C: AudioContext> {
    context: Arc<C>,
    samples: Vec<Sample>,
}

impl<C: AudioContext> Session<C> {
    /// Create unloaded samples for `locations`.
    pub fn new(context: Arc<C>, transport: Arc<HttpTransport>, locations: Vec<Location>) -> Self {
        let samples = locations
            .into_iter()
            .map(|location| Sample::with_transport(location, transport.clone()))
            .collect();

        Self { context, samples }
    }

    /// Load every sample concurrently and wait for all of them.
    ///
    /// Returns how many loaded. Failures are already reported by the notifier.
    pub async fn load_all(&self) -> usize {
        let handles: Vec<_> = self
            .samples
            .iter()
            .filter_map(|sample| sample.load(self.context.clone()))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Load task did not finish: {e}");
            }
        }

        let loaded = self.samples.iter().filter(|s| s.is_loaded()).count();
        info!("{loaded}/{} samples loaded", self.samples.len());
        loaded
    }

    /// Play each loaded sample once, `spacing` seconds apart, starting
    /// `offset` seconds from now.
    ///
    /// Returns the context time at which the last playback ends.
    pub fn schedule(&self, offset: f64, spacing: f64) -> Result<f64> {
        let start = self.context.current_time() + offset.max(0.0);
        let mut end = start;

        for (i, sample) in self.samples.iter().filter(|s| s.is_loaded()).enumerate() {
            let when = spacing.mul_add(i as f64, start);
            sample
                .play(self.context.as_ref(), when)
                .with_context(|| format!("Failed to play {}", sample.location()))?;

            if let Some(buffer) = sample.buffer() {
                end = end.max(when + buffer.duration().as_secs_f64());
            }
            debug!(location = %sample.location(), when, "Scheduled");
        }

        Ok(end)
    }
}

impl Session<CpalContext> {
    /// Block until the context clock passes `end`.
    pub async fn wait_until(&self, end: f64) {
        let remaining = (end - self.context.current_time()).max(0.0);
        let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(remaining) + PLAYBACK_GRACE;

        while self.context.current_time() < end {
            if tokio::time::Instant::now() >= deadline {
                warn!("Output clock stalled, stopping");
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Session<OfflineContext> {
    /// Render everything scheduled up to `end` and write it as a float WAV.
    pub fn render_to_wav(&self, end: f64, out: &Path) -> Result<usize> {
        let sample_rate = self.context.sample_rate();
        let channels = self.context.channels();

        let max_frames = (end * f64::from(sample_rate)).ceil() as usize + sample_rate as usize;
        let rendered = self.context.render_to_end(max_frames);
        let frames = rendered.len() / usize::from(channels);

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(out, spec)
            .with_context(|| format!("Failed to create {}", out.display()))?;
        for sample in rendered {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        info!(
            frames,
            seconds = frames as f64 / f64::from(sample_rate),
            "Wrote {}",
            out.display()
        );
        Ok(frames)
    }
}

/// Load, schedule and play `locations` on a live output device.
pub async fn play(
    transport: Arc<HttpTransport>,
    locations: Vec<Location>,
    device: Option<&str>,
    volume: f32,
    offset: f64,
    spacing: f64,
) -> Result<()> {
    let context = Arc::new(CpalContext::open(device)?);
    context.set_volume(volume);
    info!(
        device = context.device_name(),
        sample_rate = context.sample_rate(),
        "Audio output ready"
    );

    let session = Session::new(context, transport, locations);
    if session.load_all().await == 0 {
        bail!("No samples could be loaded");
    }

    let end = session.schedule(offset, spacing)?;
    session.wait_until(end).await;
    Ok(())
}

/// Load, schedule and render `locations` to a WAV file.
pub async fn render(
    transport: Arc<HttpTransport>,
    locations: Vec<Location>,
    out: &Path,
    sample_rate: u32,
    channels: u16,
    spacing: f64,
) -> Result<usize> {
    let context = Arc::new(OfflineContext::new(sample_rate, channels));

    let session = Session::new(context, transport, locations);
    if session.load_all().await == 0 {
        bail!("No samples could be loaded");
    }

    let end = session.schedule(0.0, spacing)?;
    session.render_to_wav(end, out)
}
