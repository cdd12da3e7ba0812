//! HTTP capability: the one seam through which the pipeline talks to hosts.
//!
//! Every stage fetches through [`Fetcher`], so tests and alternative
//! transports can replace the network entirely. [`HttpFetcher`] is the
//! reqwest-backed implementation used by default.
//!
//! ## Session handling
//!
//! A run owns one [`reqwest::cookie::Jar`], shared by reference with every
//! request so server-issued cookies from the entry page carry over to the
//! manifest and descriptor requests. Requests are issued one at a time by
//! the pipeline, so the jar never sees concurrent writers from this crate.
//! On top of the jar, the session artifact written by the companion browser
//! is re-read on every request and sent as the `Cookie` header.

use crate::config::AcquireConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fetch a URL and return its body.
///
/// Implementations must return `FetchError::Status` for any non-200 answer
/// and must stop waiting once `cancel` fires.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    cookie_file: Option<PathBuf>,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Build a fetcher over the run's shared cookie jar.
    pub fn new(jar: Arc<Jar>, config: &AcquireConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: format!("could not build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            cookie_file: Some(config.cookie_file.clone()),
            timeout_secs: config.download_timeout_secs,
        })
    }

    /// Stop sending the session artifact as a `Cookie` header.
    pub fn without_cookie_file(mut self) -> Self {
        self.cookie_file = None;
        self
    }

    fn session_cookie(&self) -> Option<HeaderValue> {
        let path = self.cookie_file.as_ref()?;
        let raw = std::fs::read_to_string(path).ok()?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match HeaderValue::from_str(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring unusable session artifact {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn send(&self, url: &str, headers: &HeaderMap) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url).headers(headers.clone());
        if let Some(cookie) = self.session_cookie() {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| self.map_err(url, e))?;
        let status = response.status();
        debug!("GET {} -> {}", url, status);

        let body = response.bytes().await.map_err(|e| self.map_err(url, e))?;
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        Ok(body.to_vec())
    }

    fn map_err(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled { url: url.to_string() }),
            result = self.send(url, headers) => result,
        }
    }
}

/// Fetch a text body, replacing invalid UTF-8.
pub async fn fetch_text(
    fetcher: &dyn Fetcher,
    url: &str,
    headers: &HeaderMap,
    cancel: &CancellationToken,
) -> Result<String, FetchError> {
    let bytes = fetcher.fetch(url, headers, cancel).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_reads_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.txt");
        std::fs::write(&path, "sid=abc; theme=dark\n").unwrap();

        let config = AcquireConfig::builder().cookie_file(&path).build().unwrap();
        let fetcher = HttpFetcher::new(Arc::new(Jar::default()), &config).unwrap();
        assert_eq!(
            fetcher.session_cookie().unwrap(),
            HeaderValue::from_static("sid=abc; theme=dark")
        );
    }

    #[test]
    fn session_cookie_absent_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.txt");
        let config = AcquireConfig::builder().cookie_file(&path).build().unwrap();
        let fetcher = HttpFetcher::new(Arc::new(Jar::default()), &config).unwrap();
        assert!(fetcher.session_cookie().is_none());

        std::fs::write(&path, "  \n").unwrap();
        assert!(fetcher.session_cookie().is_none());

        std::fs::write(&path, "sid=1").unwrap();
        assert!(fetcher.without_cookie_file().session_cookie().is_none());
    }
}
