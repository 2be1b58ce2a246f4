//! Progress-callback trait for per-window conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline extracts each page window and merges the result.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2xlsx::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RowCounter {
//!     rows: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for RowCounter {
//!     fn on_window_complete(&self, window_num: usize, total_windows: usize, rows: usize) {
//!         self.rows.fetch_add(rows, Ordering::SeqCst);
//!         eprintln!("Window {}/{} done ({} rows)", window_num, total_windows, rows);
//!     }
//! }
//!
//! let counter = Arc::new(RowCounter { rows: Arc::new(AtomicUsize::new(0)) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each window.
///
/// Windows run concurrently, so `on_window_*` may be called from several
/// tasks at once and in any order. Implementations must protect shared
/// mutable state (`Mutex`, atomics). All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the page count is known, before any window is extracted.
    fn on_conversion_start(&self, total_windows: usize) {
        let _ = total_windows;
    }

    /// Called just before the engine is invoked for a window (1-indexed).
    fn on_window_start(&self, window_num: usize, total_windows: usize) {
        let _ = (window_num, total_windows);
    }

    /// Called when a window's table has been extracted and persisted.
    fn on_window_complete(&self, window_num: usize, total_windows: usize, rows: usize) {
        let _ = (window_num, total_windows, rows);
    }

    /// Called when a window fails to extract or persist.
    fn on_window_error(&self, window_num: usize, total_windows: usize, error: &str) {
        let _ = (window_num, total_windows, error);
    }

    /// Called before intermediates are merged into the final artifact.
    fn on_merge_start(&self, artifacts: usize) {
        let _ = artifacts;
    }

    /// Called once at the end of every conversion that reached
    /// `on_conversion_start`, whether it succeeded or failed.
    fn on_conversion_complete(&self, total_windows: usize, success_count: usize) {
        let _ = (total_windows, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        rows: AtomicUsize,
        merged: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_window_start(&self, _window_num: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_window_complete(&self, _window_num: usize, _total: usize, rows: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.rows.fetch_add(rows, Ordering::SeqCst);
        }

        fn on_window_error(&self, _window_num: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_merge_start(&self, artifacts: usize) {
            self.merged.store(artifacts, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(3);
        cb.on_window_start(1, 3);
        cb.on_window_complete(1, 3, 42);
        cb.on_window_error(2, 3, "some error");
        cb.on_merge_start(3);
        cb.on_conversion_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_window_start(1, 3);
        tracker.on_window_complete(1, 3, 10);
        tracker.on_window_start(2, 3);
        tracker.on_window_complete(2, 3, 5);
        tracker.on_window_start(3, 3);
        tracker.on_window_error(3, 3, "corrupt page");
        tracker.on_merge_start(2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.rows.load(Ordering::SeqCst), 15);
        assert_eq!(tracker.merged.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(10);
        cb.on_window_complete(1, 10, 512);
    }
}
