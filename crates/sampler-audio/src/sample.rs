//! A loadable, playable sound asset.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::Arc;

use parking_lot::RwLock;
use sampler_core::{Error, Location, Result};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::buffer::DecodedBuffer;
use crate::context::AudioContext;
use crate::notify::{LogNotifier, Notifier};
use crate::transport::{HttpTransport, Transport};

/// Where a sample is in its load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// Load state; the decoded buffer only exists in the `Loaded` state.
#[derive(Debug, Default)]
enum State {
    #[default]
    Unloaded,
    Loading,
    Loaded(Arc<DecodedBuffer>),
    Failed,
}

impl State {
    const fn status(&self) -> LoadStatus {
        match self {
            Self::Unloaded => LoadStatus::Unloaded,
            Self::Loading => LoadStatus::Loading,
            Self::Loaded(_) => LoadStatus::Loaded,
            Self::Failed => LoadStatus::Failed,
        }
    }
}

/// One sound asset: a location, and once loaded, its decoded audio.
///
/// Construction does no I/O. [`load`](Self::load) fetches and decodes in the
/// background; [`play`](Self::play) is a no-op until that has finished.
pub struct Sample<T: Transport = HttpTransport> {
    location: Location,
    state: Arc<RwLock<State>>,
    transport: Arc<T>,
    notifier: Arc<dyn Notifier>,
}

impl Sample<HttpTransport> {
    /// Create an unloaded sample fetched over HTTP or from disk.
    pub fn new(location: impl Into<Location>) -> Self {
        Self::with_transport(location, Arc::new(HttpTransport::new()))
    }
}

impl<T: Transport> Sample<T> {
    /// Create an unloaded sample fetched through `transport`.
    pub fn with_transport(location: impl Into<Location>, transport: Arc<T>) -> Self {
        Self {
            location: location.into(),
            state: Arc::new(RwLock::new(State::Unloaded)),
            transport,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Report load outcomes to `notifier` instead of the log.
    pub fn with_notifier(mut self, notifier: impl Notifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// The resource location.
    pub const fn location(&self) -> &Location {
        &self.location
    }

    /// Current load status.
    pub fn status(&self) -> LoadStatus {
        self.state.read().status()
    }

    /// Returns true once the buffer has been decoded.
    pub fn is_loaded(&self) -> bool {
        self.status() == LoadStatus::Loaded
    }

    /// The decoded buffer, present only when loaded.
    pub fn buffer(&self) -> Option<Arc<DecodedBuffer>> {
        match &*self.state.read() {
            State::Loaded(buffer) => Some(buffer.clone()),
            _ => None,
        }
    }

    /// Start fetching and decoding this sample in the background.
    ///
    /// Failures are reported to the notifier, never to the caller. Called
    /// outside a Tokio runtime, the load fails immediately. Returns `None`
    /// without doing anything if a load is already running or has succeeded;
    /// a failed sample may be loaded again. The returned handle can be awaited or
    /// dropped; dropping it does not cancel the load.
    pub fn load<C>(&self, context: Arc<C>) -> Option<JoinHandle<()>>
    where
        C: AudioContext + ?Sized,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let error = Error::Internal("Sample loads need a Tokio runtime".to_string());
            self.notifier.load_failed(&self.location, &error);
            return None;
        };

        {
            let mut state = self.state.write();
            match *state {
                State::Loading | State::Loaded(_) => {
                    debug!(location = %self.location, status = ?state.status(), "Load already started, ignoring");
                    return None;
                }
                State::Unloaded | State::Failed => *state = State::Loading,
            }
        }

        debug!(location = %self.location, "Loading sample");

        let task = LoadTask {
            location: self.location.clone(),
            state: self.state.clone(),
            transport: self.transport.clone(),
            notifier: self.notifier.clone(),
            settled: false,
        };
        Some(runtime.spawn(task.run(context)))
    }

    /// Schedule one playback of this sample at `when` on the context clock.
    ///
    /// Does nothing if the sample is not loaded. Every call creates an
    /// independent source, so playbacks may overlap. Fails only if the
    /// context can no longer accept sources.
    pub fn play<C>(&self, context: &C, when: f64) -> Result<()>
    where
        C: AudioContext + ?Sized,
    {
        let Some(buffer) = self.buffer() else {
            trace!(location = %self.location, "Play ignored, sample not loaded");
            return Ok(());
        };

        let mut source = context.create_buffer_source();
        source.set_buffer(buffer);
        source.connect(&context.destination());
        let id = source.start(when)?;

        trace!(location = %self.location, id, when, "Sample scheduled");
        Ok(())
    }
}

/// Everything a background load needs, detached from the `Sample` borrow.
///
/// Dropping a task that has not settled (panic, abort, runtime shutdown)
/// marks the sample failed and notifies, so it never stays `Loading`.
struct LoadTask<T: Transport> {
    location: Location,
    state: Arc<RwLock<State>>,
    transport: Arc<T>,
    notifier: Arc<dyn Notifier>,
    settled: bool,
}

impl<T: Transport> LoadTask<T> {
    async fn run<C>(mut self, context: Arc<C>)
    where
        C: AudioContext + ?Sized,
    {
        let result = self.fetch_and_decode(context).await;
        self.settle(result);
    }

    fn settle(&mut self, result: Result<DecodedBuffer>) {
        self.settled = true;
        match result {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                *self.state.write() = State::Loaded(buffer.clone());
                self.notifier.loaded(&self.location, &buffer);
            }
            Err(e) => {
                *self.state.write() = State::Failed;
                self.notifier.load_failed(&self.location, &e);
            }
        }
    }

    async fn fetch_and_decode<C>(&self, context: Arc<C>) -> Result<DecodedBuffer>
    where
        C: AudioContext + ?Sized,
    {
        let fetched = self.transport.fetch(&self.location).await?;

        let hint = fetched
            .mime_type
            .filter(|mime| !mime.contains("octet-stream"))
            .or_else(|| self.location.extension());

        tokio::task::spawn_blocking(move || context.decode_audio_data(fetched.data, hint.as_deref()))
            .await
            .map_err(|e| Error::Internal(format!("Decode task failed: {e}")))?
    }
}

impl<T: Transport> Drop for LoadTask<T> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(location = %self.location, "Load task ended before finishing");
            self.settle(Err(Error::Internal("Load task did not finish".to_string())));
        }
    }
}
