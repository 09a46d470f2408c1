//! Configuration file handling.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use sampler_audio::HttpTransport;
use sampler_core::{Error, Location, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// Name of the config file inside the platform config directory.
const CONFIG_FILE: &str = "config.json";

/// User configuration, read from JSON. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL relative sample locations resolve against.
    pub base_url: Option<String>,
    /// Whole-request timeout for fetches.
    pub request_timeout_secs: u64,
    /// User agent for HTTP requests.
    pub user_agent: Option<String>,
    /// Master volume for live playback (0.0 to 1.0).
    pub volume: f32,
    /// Output device name; the default device when unset.
    pub device: Option<String>,
    /// Gap between consecutive samples, in seconds.
    pub spacing_secs: f64,
    /// Samples to use when none are given on the command line.
    pub samples: Vec<Location>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 30,
            user_agent: None,
            volume: 0.85,
            device: None,
            spacing_secs: 0.5,
            samples: Vec::new(),
        }
    }
}

impl Config {
    /// Default config path in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "sampler", "Sampler")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load the config.
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// if present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(Error::Config(format!(
                "volume must be between 0.0 and 1.0, got {}",
                self.volume
            )));
        }
        if !self.spacing_secs.is_finite() || self.spacing_secs < 0.0 {
            return Err(Error::Config(format!(
                "spacing_secs must be a non-negative number, got {}",
                self.spacing_secs
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".to_string()));
        }
        self.parsed_base_url()?;
        Ok(())
    }

    /// The base URL, parsed.
    pub fn parsed_base_url(&self) -> Result<Option<Url>> {
        self.base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| Error::Config(format!("Invalid base_url {raw}: {e}")))
            })
            .transpose()
    }

    /// Build the HTTP transport this config describes.
    pub fn transport(&self) -> Result<HttpTransport> {
        let mut builder =
            HttpTransport::builder().timeout(Duration::from_secs(self.request_timeout_secs));

        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        if let Some(base_url) = self.parsed_base_url()? {
            builder = builder.base_url(base_url);
        }

        builder.build()
    }
}
