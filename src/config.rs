//! Configuration types for document acquisition.
//!
//! All acquisition behaviour is controlled through [`AcquireConfig`], built
//! via its [`AcquireConfigBuilder`]. The config is passed by reference into
//! every stage; no stage consults process-wide state.

use crate::error::IiifError;
use crate::http::Fetcher;
use crate::pipeline::reconstruct::Reconstructor;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Browser user agent sent when the caller does not configure one.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Upper bound for [`AcquireConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Longest single retry delay, in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Configuration for one acquisition run.
///
/// Built via [`AcquireConfig::builder()`] or using
/// [`AcquireConfig::default()`].
///
/// # Example
/// ```rust
/// use iiifget::{AcquireConfig, PageSelection};
///
/// let config = AcquireConfig::builder()
///     .save_root("downloads")
///     .file_ext(".png")
///     .pages(PageSelection::Range(1, 10))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AcquireConfig {
    /// Root directory for downloaded pages. Default: `downloads`.
    pub save_root: PathBuf,

    /// Optional volume identifier; pages land in `<save_root>/vol.<id>`.
    pub volume_id: Option<String>,

    /// Extension of the reconstructed image, including the dot. Default: `.jpg`.
    ///
    /// dezoomify-rs picks the encoder from this extension.
    pub file_ext: String,

    /// `User-Agent` header for every request.
    pub user_agent: String,

    /// Session artifact path. Default: `cookie.txt`.
    ///
    /// Its existence gates the run when `require_session` is set; when it
    /// holds a non-empty cookie string, that string is sent as the `Cookie`
    /// header on every request.
    pub cookie_file: PathBuf,

    /// Block before resolution until the session artifact exists. Default: false.
    pub require_session: bool,

    /// Seconds between session artifact checks (1–60). Default: 1.
    pub poll_interval_secs: u64,

    /// Hard cap on session artifact checks. Default: 28 800 (≈8 h at 1 s).
    pub max_poll_iterations: u32,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Per-request HTTP timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Retry attempts for a failed descriptor fetch (0–10). Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt and capped
    /// at [`MAX_BACKOFF_MS`]. Default: 500.
    pub retry_backoff_ms: u64,

    /// Reconstruction tool executable. Default: `dezoomify-rs`.
    pub dezoomify_path: PathBuf,

    /// Extra arguments placed before the per-page header arguments.
    pub dezoomify_args: Vec<String>,

    /// Pre-constructed fetcher. When `None`, a reqwest-backed
    /// [`crate::http::HttpFetcher`] is built over the run's cookie jar.
    pub fetcher: Option<Arc<dyn Fetcher>>,

    /// Pre-constructed reconstructor. When `None`, dezoomify-rs is spawned.
    pub reconstructor: Option<Arc<dyn Reconstructor>>,

    /// Operator-facing progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            save_root: PathBuf::from("downloads"),
            volume_id: None,
            file_ext: ".jpg".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookie_file: PathBuf::from("cookie.txt"),
            require_session: false,
            poll_interval_secs: 1,
            max_poll_iterations: 3600 * 8,
            pages: PageSelection::default(),
            download_timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
            dezoomify_path: PathBuf::from("dezoomify-rs"),
            dezoomify_args: Vec::new(),
            fetcher: None,
            reconstructor: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AcquireConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquireConfig")
            .field("save_root", &self.save_root)
            .field("volume_id", &self.volume_id)
            .field("file_ext", &self.file_ext)
            .field("cookie_file", &self.cookie_file)
            .field("require_session", &self.require_session)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("max_poll_iterations", &self.max_poll_iterations)
            .field("pages", &self.pages)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("dezoomify_path", &self.dezoomify_path)
            .field("dezoomify_args", &self.dezoomify_args)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn Fetcher>"))
            .field(
                "reconstructor",
                &self.reconstructor.as_ref().map(|_| "<dyn Reconstructor>"),
            )
            .finish()
    }
}

impl AcquireConfig {
    /// Delay before retry number `attempt` (1-based), doubling from
    /// `retry_backoff_ms` and never longer than [`MAX_BACKOFF_MS`].
    pub fn retry_delay_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        self.retry_backoff_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
    }

    /// Create a new builder for `AcquireConfig`.
    pub fn builder() -> AcquireConfigBuilder {
        AcquireConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AcquireConfig`].
#[derive(Debug)]
pub struct AcquireConfigBuilder {
    config: AcquireConfig,
}

impl AcquireConfigBuilder {
    pub fn save_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.save_root = dir.into();
        self
    }

    pub fn volume_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.config.volume_id = if id.is_empty() { None } else { Some(id) };
        self
    }

    /// Accepts `jpg` or `.jpg`; the stored value always carries the dot.
    pub fn file_ext(mut self, ext: impl Into<String>) -> Self {
        let ext = ext.into();
        self.config.file_ext = if ext.is_empty() || ext.starts_with('.') {
            ext
        } else {
            format!(".{ext}")
        };
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cookie_file = path.into();
        self
    }

    pub fn require_session(mut self, v: bool) -> Self {
        self.config.require_session = v;
        self
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs.clamp(1, 60);
        self
    }

    pub fn max_poll_iterations(mut self, n: u32) -> Self {
        self.config.max_poll_iterations = n;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    /// Clamped to 0–[`MAX_RETRIES`].
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn dezoomify_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dezoomify_path = path.into();
        self
    }

    pub fn dezoomify_args(mut self, args: Vec<String>) -> Self {
        self.config.dezoomify_args = args;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn reconstructor(mut self, reconstructor: Arc<dyn Reconstructor>) -> Self {
        self.config.reconstructor = Some(reconstructor);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AcquireConfig, IiifError> {
        let c = &self.config;
        if c.file_ext.len() < 2 || !c.file_ext.starts_with('.') {
            return Err(IiifError::InvalidConfig(format!(
                "file extension must look like '.jpg', got '{}'",
                c.file_ext
            )));
        }
        if c.user_agent.trim().is_empty() {
            return Err(IiifError::InvalidConfig("user agent must not be empty".into()));
        }
        if !(1..=60).contains(&c.poll_interval_secs) {
            return Err(IiifError::InvalidConfig(format!(
                "poll interval must be 1–60 seconds, got {}",
                c.poll_interval_secs
            )));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || (end != 0 && start > end) {
                return Err(IiifError::InvalidConfig(format!(
                    "invalid page range {start}-{end}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the flattened manifest to acquire.
///
/// All variants use 1-indexed page numbers; [`PageSelection::includes`]
/// takes the 0-indexed position the pipeline iterates with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page.
    Single(usize),
    /// A contiguous inclusive range. An end of `0` means "to the last page".
    Range(usize, usize),
    /// Specific pages.
    Set(Vec<usize>),
}

impl PageSelection {
    /// Inclusion test over a 0-indexed position within `total` pages.
    pub fn includes(&self, index: usize, total: usize) -> bool {
        if index >= total {
            return false;
        }
        let page = index + 1;
        match self {
            PageSelection::All => true,
            PageSelection::Single(p) => *p == page,
            PageSelection::Range(start, end) => {
                let end = if *end == 0 { total } else { *end };
                page >= *start && page <= end
            }
            PageSelection::Set(pages) => pages.contains(&page),
        }
    }

    /// Expand the selection into a sorted, deduplicated list of 0-indexed positions.
    pub fn to_indices(&self, total: usize) -> Vec<usize> {
        (0..total).filter(|&i| self.includes(i, total)).collect()
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelection::All => write!(f, "all"),
            PageSelection::Single(p) => write!(f, "{p}"),
            PageSelection::Range(s, 0) => write!(f, "{s}-"),
            PageSelection::Range(s, e) => write!(f, "{s}-{e}"),
            PageSelection::Set(pages) => {
                let parts: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}
