//! # Sampler
//!
//! Fetch, decode and play short audio samples from the command line.

mod config;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use config::Config;
use sampler_core::Location;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "sampler", version, about = "Fetch, decode and play audio samples")]
struct Cli {
    /// Config file (JSON). Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL relative locations are fetched from.
    #[arg(long, global = true)]
    base_url: Option<Url>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play samples on an output device.
    Play {
        /// URLs or file paths of the samples.
        locations: Vec<String>,

        /// Seconds from now until the first sample starts.
        #[arg(long, default_value_t = 0.0)]
        at: f64,

        /// Seconds between consecutive samples.
        #[arg(long)]
        spacing: Option<f64>,

        /// Output device name.
        #[arg(long)]
        device: Option<String>,

        /// Master volume (0.0 to 1.0).
        #[arg(long)]
        volume: Option<f32>,
    },

    /// Render samples to a WAV file instead of a device.
    Render {
        /// URLs or file paths of the samples.
        locations: Vec<String>,

        /// Output WAV file.
        #[arg(short, long)]
        out: PathBuf,

        /// Output sample rate in Hz.
        #[arg(long, default_value_t = 44_100)]
        rate: u32,

        /// Output channel count.
        #[arg(long, default_value_t = 2)]
        channels: u16,

        /// Seconds between consecutive samples.
        #[arg(long)]
        spacing: Option<f64>,
    },

    /// List output devices.
    Devices,
}

/// Locations from the command line, falling back to the config file.
fn locations(args: Vec<String>, config: &Config) -> Result<Vec<Location>> {
    let locations: Vec<Location> = if args.is_empty() {
        config.samples.clone()
    } else {
        args.into_iter().map(Location::parse).collect()
    };

    if locations.is_empty() {
        bail!("No samples given");
    }
    Ok(locations)
}

fn check_spacing(spacing: f64) -> Result<f64> {
    if !spacing.is_finite() || spacing < 0.0 {
        bail!("Spacing must be a non-negative number of seconds, got {spacing}");
    }
    Ok(spacing)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sampler=info,sampler_audio=info".into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting Sampler v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = Some(base_url.into());
    }

    match cli.command {
        Command::Play {
            locations: args,
            at,
            spacing,
            device,
            volume,
        } => {
            let locations = locations(args, &config)?;
            let spacing = check_spacing(spacing.unwrap_or(config.spacing_secs))?;
            let volume = volume.unwrap_or(config.volume).clamp(0.0, 1.0);
            let device = device.or_else(|| config.device.clone());
            let transport = Arc::new(config.transport()?);

            session::play(transport, locations, device.as_deref(), volume, at, spacing).await?;
        }
        Command::Render {
            locations: args,
            out,
            rate,
            channels,
            spacing,
        } => {
            if rate == 0 || channels == 0 {
                bail!("Sample rate and channel count must be positive");
            }
            let locations = locations(args, &config)?;
            let spacing = check_spacing(spacing.unwrap_or(config.spacing_secs))?;
            let transport = Arc::new(config.transport()?);

            session::render(transport, locations, &out, rate, channels, spacing).await?;
        }
        Command::Devices => {
            let default = sampler_audio::output::default_device_name();
            for name in sampler_audio::output::list_output_devices()? {
                let marker = if default.as_deref() == Some(name.as_str()) {
                    " (default)"
                } else {
                    ""
                };
                println!("{name}{marker}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "sampler",
            "--base-url",
            "http://localhost:8000/",
            "render",
            "sounds/explosion.wav",
            "--out",
            "out.wav",
            "--rate",
            "48000",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(cli.base_url.map(String::from).as_deref(), Some("http://localhost:8000/"));
        match cli.command {
            Command::Render {
                locations,
                rate,
                channels,
                ..
            } => {
                assert_eq!(locations, vec!["sounds/explosion.wav".to_string()]);
                assert_eq!(rate, 48_000);
                assert_eq!(channels, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_locations_fall_back_to_config() {
        let config = Config {
            samples: vec![Location::parse("sounds/fireball.wav")],
            ..Config::default()
        };
        let from_config = locations(Vec::new(), &config).unwrap_or_default();
        assert_eq!(from_config, config.samples);

        assert!(locations(Vec::new(), &Config::default()).is_err());
        assert!(check_spacing(-0.5).is_err());
    }
}
