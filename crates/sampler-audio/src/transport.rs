//! Binary fetch of audio payloads by location.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use sampler_core::{Error, HttpError, Location, Result};
use tracing::{debug, warn};
use url::Url;

/// Default timeout for requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent sent with requests.
pub const DEFAULT_USER_AGENT: &str = concat!("sampler/", env!("CARGO_PKG_VERSION"));

/// Raw payload returned by a transport.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Response body, untouched.
    pub data: Bytes,
    /// MIME type reported by the server, if any.
    pub mime_type: Option<String>,
}

/// Fetches the raw bytes behind a [`Location`].
pub trait Transport: Send + Sync + 'static {
    /// Fetch the whole resource.
    fn fetch(&self, location: &Location) -> impl Future<Output = Result<Fetched>> + Send;
}

/// HTTP(S) and local-file transport.
///
/// Remote locations are fetched with reqwest. Relative paths are resolved
/// against the base URL when one is set and read from disk otherwise.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Option<Url>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Create a transport with the default timeout and user agent.
    pub fn new() -> Self {
        Self::builder().build_or_fallback()
    }

    /// Start configuring a transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Base URL relative locations resolve against.
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    async fn fetch_url(&self, url: &Url) -> Result<Fetched> {
        debug!("Requesting: {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "audio/*, */*")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(HttpError::StatusError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            }));
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let data = response.bytes().await.map_err(map_reqwest_error)?;

        debug!("Fetched {} bytes, mime: {:?}", data.len(), mime_type);
        Ok(Fetched { data, mime_type })
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, location: &Location) -> Result<Fetched> {
        if let Some(url) = location.url() {
            return self.fetch_url(url).await;
        }

        if let Some(url) = self
            .base_url
            .as_ref()
            .and_then(|base| location.resolve_against(base))
        {
            return self.fetch_url(&url).await;
        }

        let path = location
            .path()
            .ok_or_else(|| Error::InvalidArgument(format!("Unusable location: {location}")))?;

        debug!("Reading file: {}", path.display());
        let data = tokio::fs::read(path).await?;
        Ok(Fetched {
            data: Bytes::from(data),
            mime_type: None,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Http(HttpError::Timeout)
    } else if e.is_connect() {
        Error::Http(HttpError::ConnectionFailed(e.to_string()))
    } else if e.is_builder() {
        Error::Http(HttpError::InvalidUrl(e.to_string()))
    } else {
        Error::Network(e.to_string())
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: String,
    base_url: Option<Url>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url: None,
        }
    }
}

impl HttpTransportBuilder {
    /// Set the whole-request timeout.
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Resolve relative locations against `base_url`.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<HttpTransport> {
        let client = Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(HttpTransport {
            client,
            base_url: self.base_url,
        })
    }

    /// Build the transport, keeping only the timeout if the full client
    /// cannot be built.
    pub fn build_or_fallback(self) -> HttpTransport {
        match self.clone().build() {
            Ok(transport) => transport,
            Err(e) => {
                warn!("{e}, falling back to a client without custom headers");
                let client = Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .unwrap_or_default();
                HttpTransport {
                    client,
                    base_url: self.base_url,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection.
    async fn serve(status: &'static str, body: &'static [u8], connections: usize) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for _ in 0..connections {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = [0u8; 2048];
                let _ = socket.read(&mut request).await;

                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: audio/wav\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            }
        });

        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_remote() {
        let base = serve("200 OK", b"RIFFdata", 1).await;
        let location = Location::parse(base.join("sounds/a.wav").unwrap().as_str());

        let fetched = HttpTransport::new().fetch(&location).await.unwrap();
        assert_eq!(&fetched.data[..], b"RIFFdata");
        assert_eq!(fetched.mime_type.as_deref(), Some("audio/wav"));
    }

    #[tokio::test]
    async fn test_fetch_status_error() {
        let base = serve("404 Not Found", b"", 1).await;
        let location = Location::parse(base.join("missing.wav").unwrap().as_str());

        let err = HttpTransport::new().fetch(&location).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Http(HttpError::StatusError { status: 404, .. })
        ));
        assert!(err.is_fetch_failure());
    }

    #[tokio::test]
    async fn test_relative_location_uses_base_url() {
        let base = serve("200 OK", b"bytes", 1).await;
        let transport = HttpTransport::builder().base_url(base).build().unwrap();

        let fetched = transport
            .fetch(&Location::parse("sounds/explosion.wav"))
            .await
            .unwrap();
        assert_eq!(&fetched.data[..], b"bytes");
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fireball.wav");
        std::fs::write(&path, b"local bytes").unwrap();

        let location = Location::parse(path.to_string_lossy());
        let fetched = HttpTransport::new().fetch(&location).await.unwrap();
        assert_eq!(&fetched.data[..], b"local bytes");
        assert!(fetched.mime_type.is_none());
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let location = Location::parse(dir.path().join("nope.wav").to_string_lossy());

        let err = HttpTransport::new().fetch(&location).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_invalid_user_agent() {
        let builder = HttpTransport::builder().user_agent("bad\nagent");
        assert!(matches!(builder.clone().build(), Err(Error::Network(_))));

        let base = serve("200 OK", b"still works", 1).await;
        let transport = builder.base_url(base).build_or_fallback();
        let fetched = transport.fetch(&Location::parse("a.wav")).await.unwrap();
        assert_eq!(&fetched.data[..], b"still works");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind and immediately drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let location = Location::parse(format!("http://{addr}/a.wav"));
        let err = HttpTransport::new().fetch(&location).await.unwrap_err();
        assert!(err.is_fetch_failure());
    }
}
