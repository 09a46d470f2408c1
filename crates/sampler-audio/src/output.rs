//! Live audio context playing through cpal.

use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, Stream, StreamConfig,
};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use sampler_core::{Error, Result};
use tracing::{debug, error, info};

use crate::context::AudioContext;
use crate::mixer::{Clock, Mixer};
use crate::source::Destination;

/// Default master volume, slightly below max for headroom.
const DEFAULT_VOLUME: f32 = 0.85;

/// Format and identity of an opened output.
struct OutputInfo {
    destination: Destination,
    clock: Clock,
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

/// Audio context backed by an output device.
///
/// The cpal stream lives on a dedicated `audio-output` thread (it is not
/// `Send`), so the context itself can be shared freely. Dropping the
/// context closes the stream.
pub struct CpalContext {
    destination: Destination,
    clock: Clock,
    volume: Arc<Mutex<f32>>,
    sample_rate: u32,
    channels: u16,
    device_name: String,
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalContext {
    /// Open the default output device.
    pub fn new() -> Result<Self> {
        Self::open(None)
    }

    /// Open the output device called `name`, or the default device if `None`.
    pub fn open(name: Option<&str>) -> Result<Self> {
        let name = name.map(String::from);
        let volume = Arc::new(Mutex::new(DEFAULT_VOLUME));
        let (ready_tx, ready_rx) = bounded::<Result<OutputInfo>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let volume_clone = volume.clone();
        let thread = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                // The stream must be created and dropped on this thread.
                let stream = match open_stream(name.as_deref(), volume_clone) {
                    Ok((stream, info)) => {
                        let _ = ready_tx.send(Ok(info));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio output thread stopped");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {e}")))?;

        let info = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Output thread exited during startup".to_string()))??;

        info!(
            "Audio output initialized: {} Hz, {} channels, device: {}",
            info.sample_rate, info.channels, info.device_name
        );

        Ok(Self {
            destination: info.destination,
            clock: info.clock,
            volume,
            sample_rate: info.sample_rate,
            channels: info.channels,
            device_name: info.device_name,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Get the device name.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Get the master volume.
    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    /// Set the master volume (0.0 to 1.0).
    pub fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }
}

impl AudioContext for CpalContext {
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

impl Drop for CpalContext {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

fn find_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device found".to_string())),
        Some(wanted) => host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to list devices: {e}")))?
            .find(|d| d.name().is_ok_and(|n| n == wanted))
            .ok_or_else(|| Error::AudioOutput(format!("Output device not found: {wanted}"))),
    }
}

fn open_stream(name: Option<&str>, volume: Arc<Mutex<f32>>) -> Result<(Stream, OutputInfo)> {
    let device = find_device(name)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported_config = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))?;

    debug!("Supported output config: {:?}", supported_config);

    let sample_format = supported_config.sample_format();
    let config: StreamConfig = supported_config.into();

    let mixer = Mixer::new(config.sample_rate.0, config.channels);
    let info = OutputInfo {
        destination: mixer.destination(),
        clock: mixer.clock(),
        sample_rate: mixer.sample_rate(),
        channels: mixer.channels(),
        device_name,
    };

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer, volume)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer, volume)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer, volume)?,
        _ => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {sample_format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {e}")))?;

    Ok((stream, info))
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    mut mixer: Mixer,
    volume: Arc<Mutex<f32>>,
) -> Result<Stream> {
    let err_fn = |err| {
        error!("Audio stream error: {err}");
    };

    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                mixer.render(&mut scratch);

                let vol = *volume.lock();
                for (out, &mixed) in data.iter_mut().zip(&scratch) {
                    *out = T::from_sample(soft_clip(mixed * vol));
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {e}")))
}

/// Soft clipping using tanh above 0.9 for smooth limiting of summed voices.
fn soft_clip(sample: f32) -> f32 {
    if sample.abs() > 0.9 {
        sample.tanh()
    } else {
        sample
    }
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}

/// Get the default output device name.
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices_reports_output_errors() {
        match list_output_devices() {
            Ok(_) => {}
            Err(e) => assert!(matches!(e, Error::AudioOutput(_)), "unexpected error: {e}"),
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_soft_clip() {
        assert_eq!(soft_clip(0.5), 0.5);
        assert_eq!(soft_clip(-0.9), -0.9);
        assert!(soft_clip(2.0) < 1.0);
        assert!(soft_clip(-2.0) > -1.0);
    }

    #[test]
    fn test_missing_named_device() {
        // Either there is no host output at all or the name does not match.
        let result = find_device(Some("sampler-test-device-that-does-not-exist"));
        assert!(matches!(result, Err(Error::AudioOutput(_))));
    }
}
