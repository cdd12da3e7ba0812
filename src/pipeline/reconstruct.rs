//! Page reconstruction: descriptor → single flattened image.
//!
//! The actual tile download and stitching is delegated to an external
//! deep-zoom tool (dezoomify-rs by default). From the pipeline's point of
//! view this is one opaque, time-unbounded call whose success or failure is
//! the only signal consumed. The child is spawned without a shell and is
//! killed if the caller cancels.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failure of one reconstruction.
#[derive(Debug, Error)]
pub enum ReconstructError {
    /// The tool could not be started at all.
    #[error("could not start '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and reported failure.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("reconstruction cancelled")]
    Cancelled,
}

/// Turns a persisted descriptor into an image file.
#[async_trait]
pub trait Reconstructor: Send + Sync {
    async fn reconstruct(
        &self,
        descriptor: &Path,
        output: &Path,
        extra_args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), ReconstructError>;
}

/// `-H Origin:<referer> -H Referer:<referer>`
pub fn header_args(referer: &str) -> Vec<String> {
    vec![
        "-H".to_string(),
        format!("Origin:{referer}"),
        "-H".to_string(),
        format!("Referer:{referer}"),
    ]
}

/// Runs dezoomify-rs (or a compatible tool) as a subprocess.
///
/// Invocation: `<program> <args..> <extra_args..> <descriptor> <output>`.
#[derive(Debug, Clone)]
pub struct DezoomifyReconstructor {
    program: PathBuf,
    args: Vec<String>,
}

/// Lines of stderr kept in a failure report.
const STDERR_TAIL_LINES: usize = 5;

impl DezoomifyReconstructor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Full argument vector for one page.
    pub fn command_args(&self, descriptor: &Path, output: &Path, extra_args: &[String]) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.extend(extra_args.iter().cloned());
        argv.push(descriptor.to_string_lossy().into_owned());
        argv.push(output.to_string_lossy().into_owned());
        argv
    }
}

#[async_trait]
impl Reconstructor for DezoomifyReconstructor {
    async fn reconstruct(
        &self,
        descriptor: &Path,
        output: &Path,
        extra_args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), ReconstructError> {
        let argv = self.command_args(descriptor, output, extra_args);
        debug!("{} {}", self.program.display(), argv.join(" "));

        let child = Command::new(&self.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReconstructError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        // Dropping the wait future on cancellation drops the child, which kills it.
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ReconstructError::Cancelled),
            result = child.wait_with_output() => result,
        };
        let out = result.map_err(|e| ReconstructError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;

        for line in String::from_utf8_lossy(&out.stdout).lines() {
            debug!("{}", line);
        }

        if out.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&out.stderr);
        let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" | ");
        Err(ReconstructError::Failed {
            program: self.program.clone(),
            status: out.status.to_string(),
            stderr: tail,
        })
    }
}
