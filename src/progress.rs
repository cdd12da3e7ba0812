//! Progress-callback trait for operator-facing acquisition events.
//!
//! Inject an [`Arc<dyn AcquireProgressCallback>`] via
//! [`crate::config::AcquireConfigBuilder::progress_callback`] to receive
//! events as the session gate waits and as the pipeline walks each page.
//! The library itself only logs through `tracing`; anything an operator is
//! meant to read goes through this trait.
//!
//! # Example
//!
//! ```rust
//! use iiifget::{AcquireConfig, AcquireProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl AcquireProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}/{total_pages} saved");
//!     }
//! }
//!
//! let config = AcquireConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::AcquireStats;
use std::sync::Arc;

/// Called by the session gate and the acquisition pipeline.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Page numbers are 1-indexed.
pub trait AcquireProgressCallback: Send + Sync {
    /// The session artifact is missing and an operator must act.
    ///
    /// # Arguments
    /// * `instructions`: what the operator has to do
    /// * `url`         : the page needing attention, when one is known
    fn on_session_required(&self, instructions: &str, url: Option<&str>) {
        let _ = (instructions, url);
    }

    /// Once per second while the gate waits.
    ///
    /// # Arguments
    /// * `remaining_secs`: seconds left in the current poll interval
    /// * `interval_secs` : length of the poll interval
    fn on_session_tick(&self, remaining_secs: u64, interval_secs: u64) {
        let _ = (remaining_secs, interval_secs);
    }

    /// The session artifact appeared.
    fn on_session_ready(&self) {}

    /// Called once before the page loop.
    ///
    /// # Arguments
    /// * `total_pages`   : pages in the flattened manifest
    /// * `selected_pages`: pages passing the page selection
    fn on_acquire_start(&self, total_pages: usize, selected_pages: usize) {
        let _ = (total_pages, selected_pages);
    }

    /// Just before a page's descriptor is fetched.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// The page image was reconstructed.
    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// The page image already existed on disk; reconstruction skipped.
    fn on_page_skipped(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// The page failed. The run continues with the next page.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every selected page has been attempted.
    fn on_acquire_complete(&self, stats: &AcquireStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AcquireProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AcquireConfig`].
pub type ProgressCallback = Arc<dyn AcquireProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        ticks: AtomicUsize,
        completes: AtomicUsize,
        skips: AtomicUsize,
        errors: AtomicUsize,
    }

    impl AcquireProgressCallback for TrackingCallback {
        fn on_session_tick(&self, _remaining: u64, _interval: u64) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_skipped(&self, _page_num: usize, _total: usize) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_session_required("log in", Some("https://www.si.edu/object/x"));
        cb.on_session_tick(3, 5);
        cb.on_session_ready();
        cb.on_acquire_start(5, 5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5);
        cb.on_page_skipped(2, 5);
        cb.on_page_error(3, 5, "boom".into());
        cb.on_acquire_complete(&AcquireStats::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_session_tick(1, 1);
        tracker.on_page_complete(1, 3);
        tracker.on_page_skipped(2, 3);
        tracker.on_page_error(3, 3, "fetch failed".into());

        assert_eq!(tracker.ticks.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_acquire_start(10, 2);
    }
}
