//! Session gate: block until an operator produces the session artifact.
//!
//! Some hosts only serve manifests to a browser session that has passed a
//! human check or logged in. That step happens outside this process; a
//! companion browser writes the session cookies to a file. The gate waits for
//! that file to appear, reporting a per-second countdown, and gives up after
//! a fixed number of polls.
//!
//! The wait is a single bounded loop on the caller's task. It returns
//! [`SessionOutcome::TimedOut`] instead of returning silently so callers can
//! decide whether a missing session is fatal.

use crate::config::AcquireConfig;
use crate::error::IiifError;
use crate::fsutil::file_exists;
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shown when the gate has to wait.
pub const SESSION_INSTRUCTIONS: &str =
    "Open the document page in the companion browser, complete the human verification or log in, then refresh the page.";

/// How the wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The artifact exists. `iterations` is the number of poll intervals slept.
    Ready { iterations: u32 },
    /// The iteration cap was reached without the artifact appearing.
    TimedOut { iterations: u32 },
}

impl SessionOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionOutcome::Ready { .. })
    }

    pub fn iterations(&self) -> u32 {
        match self {
            SessionOutcome::Ready { iterations } | SessionOutcome::TimedOut { iterations } => {
                *iterations
            }
        }
    }
}

/// Polls for a session artifact on disk.
#[derive(Clone)]
pub struct SessionGate {
    artifact: PathBuf,
    poll_interval_secs: u64,
    max_iterations: u32,
    progress: Option<ProgressCallback>,
}

impl SessionGate {
    /// `poll_interval_secs` is clamped to 1–60.
    pub fn new(artifact: impl Into<PathBuf>, poll_interval_secs: u64, max_iterations: u32) -> Self {
        Self {
            artifact: artifact.into(),
            poll_interval_secs: poll_interval_secs.clamp(1, 60),
            max_iterations,
            progress: None,
        }
    }

    pub fn from_config(config: &AcquireConfig) -> Self {
        let gate = Self::new(
            &config.cookie_file,
            config.poll_interval_secs,
            config.max_poll_iterations,
        );
        match config.progress_callback {
            Some(ref cb) => gate.with_progress(cb.clone()),
            None => gate,
        }
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Return at once if the artifact exists; otherwise announce and poll.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<SessionOutcome, IiifError> {
        if file_exists(&self.artifact) {
            debug!("Session artifact present: {}", self.artifact.display());
            return Ok(SessionOutcome::Ready { iterations: 0 });
        }
        self.announce(None);
        self.poll(cancel).await
    }

    /// Discard any stale artifact, point the operator at `url`, then poll.
    ///
    /// Used when a server rejected the current session, so an existing
    /// artifact is known to be bad.
    pub async fn wait_with_message(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, IiifError> {
        match std::fs::remove_file(&self.artifact) {
            Ok(()) => info!("Removed stale session artifact {}", self.artifact.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Could not remove stale session artifact {}: {}",
                self.artifact.display(),
                e
            ),
        }
        self.announce(Some(url));
        self.poll(cancel).await
    }

    fn announce(&self, url: Option<&str>) {
        info!(
            "Waiting for session artifact {} ({})",
            self.artifact.display(),
            url.unwrap_or("no url")
        );
        if let Some(ref cb) = self.progress {
            cb.on_session_required(SESSION_INSTRUCTIONS, url);
        }
    }

    async fn poll(&self, cancel: &CancellationToken) -> Result<SessionOutcome, IiifError> {
        for iteration in 0..self.max_iterations {
            if file_exists(&self.artifact) {
                return Ok(self.ready(iteration));
            }
            for remaining in (1..=self.poll_interval_secs).rev() {
                if let Some(ref cb) = self.progress {
                    cb.on_session_tick(remaining, self.poll_interval_secs);
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Err(IiifError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }

        if file_exists(&self.artifact) {
            return Ok(self.ready(self.max_iterations));
        }
        warn!(
            "Session artifact {} did not appear after {} polls",
            self.artifact.display(),
            self.max_iterations
        );
        Ok(SessionOutcome::TimedOut {
            iterations: self.max_iterations,
        })
    }

    fn ready(&self, iterations: u32) -> SessionOutcome {
        info!("Session artifact ready after {} polls", iterations);
        if let Some(ref cb) = self.progress {
            cb.on_session_ready();
        }
        SessionOutcome::Ready { iterations }
    }
}
