//! # iiifget
//!
//! Download the page images of a IIIF-published document.
//!
//! Digitised books and albums are usually published as a IIIF presentation
//! manifest: an ordered list of pages, each pointing at an image service
//! that serves deep-zoom tiles. This crate resolves an entry URL to its
//! manifest, walks the pages in order, and has an external deep-zoom tool
//! (dezoomify-rs) stitch each page into one flat image on disk.
//!
//! ## Pipeline Overview
//!
//! ```text
//! entry URL
//!  │
//!  ├─ 0. Session  optional: wait for a browser-exported cookie file
//!  ├─ 1. Resolve  identifier from the URL, or scraped from the object page
//!  ├─ 2. Manifest fetch + decode the IIIF presentation document
//!  ├─ 3. Flatten  first sequence → ordered info.json endpoints
//!  └─ 4. Pages    per page, in order:
//!                 fetch info.json → strip unsupported capabilities →
//!                 write <seq>_info.json → skip if <seq>.jpg exists →
//!                 reconstruct → remove descriptor
//! ```
//!
//! Output files are named by position (`0001.jpg`, `0002.jpg`, …), so
//! re-running an interrupted acquisition only fetches what is missing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iiifget::{acquire, AcquireConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AcquireConfig::builder().save_root("downloads").build()?;
//!     let output = acquire("https://ids.si.edu/ids/manifest/FS-F1904.61_006", &config).await?;
//!     eprintln!(
//!         "{} reconstructed, {} failed",
//!         output.stats.reconstructed_pages, output.stats.failed_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `iiifget` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! iiifget = { version = "0.1", default-features = false }
//! ```
//!
//! ## Supported Sites
//!
//! | Adapter | Hosts | Entry URLs |
//! |---------|-------|------------|
//! | [`SmithsonianAdapter`] | `*.si.edu` | `…/ids/manifest/<id>`, `…/object/<slug>` |
//! | [`DirectManifestAdapter`] | any | URLs ending in `manifest.json` or `/manifest` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod acquire;
pub mod adapter;
pub mod config;
pub mod context;
pub mod error;
pub mod fsutil;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use acquire::{acquire, acquire_sync, acquire_volumes, acquire_with_adapter, acquire_with_cancel, Acquirer};
pub use adapter::{adapter_for, DirectManifestAdapter, SiteAdapter, SmithsonianAdapter};
pub use config::{AcquireConfig, AcquireConfigBuilder, PageSelection};
pub use context::{PartialCanvases, PartialVolumes, TaskContext, Volume};
pub use error::{FetchError, IiifError, PageError, NOT_FOUND_MESSAGE};
pub use http::{Fetcher, HttpFetcher};
pub use output::{AcquireOutput, AcquireStats, PageResult, PageStatus};
pub use pipeline::reconstruct::{DezoomifyReconstructor, ReconstructError, Reconstructor};
pub use progress::{AcquireProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{SessionGate, SessionOutcome};

/// Re-exported so callers can pass a cancellation token without adding the dependency.
pub use tokio_util::sync::CancellationToken;
