//! Error types for the iiifget library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`IiifError`]: **Fatal**: the document cannot be acquired at all
//!   (no identifier in the URL, manifest unavailable or undecodable, session
//!   never appeared). Returned as `Err(IiifError)` from the top-level
//!   `acquire*` functions before any page work begins.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed (descriptor fetch,
//!   disk write, reconstruction) but every other page is still attempted.
//!   Stored inside [`crate::output::PageResult`].
//!
//! * [`FetchError`]: transport-level result of one HTTP request, wrapped by
//!   either of the above depending on which stage issued the request.

use std::path::PathBuf;
use thiserror::Error;

/// User-facing message shared by every "could not find this document" failure.
pub const NOT_FOUND_MESSAGE: &str = "requested URL was not found.";

/// All fatal errors returned by the iiifget library.
#[derive(Debug, Error)]
pub enum IiifError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input string is not a valid HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// No site adapter knows how to handle this host.
    #[error("No site adapter handles '{host}'")]
    UnsupportedSite { host: String },

    // ── Resolution errors ─────────────────────────────────────────────────
    /// Neither the URL nor the entry page yielded a resource identifier.
    #[error("requested URL was not found. No resource identifier could be resolved from '{url}'")]
    IdentifierNotFound { url: String },

    /// The manifest request failed at the transport or HTTP level.
    #[error("requested URL was not found. Manifest '{url}': {source}")]
    ManifestFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The manifest was served but is not a decodable IIIF presentation document.
    #[error("Manifest '{url}' could not be decoded: {source}")]
    ManifestDecode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    // ── Session errors ────────────────────────────────────────────────────
    /// The session artifact never appeared within the polling budget.
    #[error("Session artifact '{path}' did not appear after {iterations} polls")]
    SessionTimeout { path: PathBuf, iterations: u32 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The save directory could not be created.
    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The caller cancelled the run.
    #[error("Acquisition cancelled")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IiifError {
    /// True when the failure means "this document could not be located".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IiifError::IdentifierNotFound { .. }
                | IiifError::ManifestFetch { .. }
                | IiifError::ManifestDecode { .. }
        )
    }

    /// The short message shown to an operator for this failure.
    ///
    /// Resolution and manifest failures collapse to [`NOT_FOUND_MESSAGE`];
    /// everything else uses the full `Display` text.
    pub fn summary_message(&self) -> String {
        if self.is_not_found() {
            NOT_FOUND_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

/// Outcome of a single failed HTTP request.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connection, TLS, or body read failure.
    #[error("request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The server answered with something other than 200 OK.
    #[error("ErrCode:{status}, {reason}")]
    Status { status: u16, reason: String },

    /// The caller's cancellation token fired while the request was in flight.
    #[error("request to '{url}' cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 401 and 403, the answers a missing or stale session produces.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails. The run
/// continues with the next page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The tile descriptor (`info.json`) could not be fetched.
    #[error("Page {page}: descriptor fetch failed after {retries} retries: {detail}")]
    DescriptorFetch {
        page: usize,
        retries: u32,
        detail: String,
    },

    /// The normalised descriptor could not be written to disk.
    #[error("Page {page}: could not write descriptor: {detail}")]
    DescriptorWrite { page: usize, detail: String },

    /// The reconstruction tool failed; the descriptor is left on disk.
    #[error("Page {page}: reconstruction failed: {detail}")]
    Reconstruction { page: usize, detail: String },
}
