//! Observer trait for scan and history events.
//!
//! Inject an [`Arc<dyn ScanObserver>`] via
//! [`crate::config::ScanConfigBuilder::observer`] to follow what the
//! orchestrator does: a terminal spinner, a log sink, a UI status line.
//! The library knows nothing about how the host presents these events.
//!
//! # Example
//!
//! ```rust
//! use edgequake_cardscan::{ScanConfig, ScanObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     scans: AtomicUsize,
//! }
//!
//! impl ScanObserver for CountingObserver {
//!     fn on_scan_start(&self, image_bytes: usize) {
//!         self.scans.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("scanning {image_bytes} bytes");
//!     }
//! }
//!
//! let config = ScanConfig::builder()
//!     .observer(Arc::new(CountingObserver { scans: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::history::HistoryEntry;
use crate::record::BusinessCardRecord;
use std::sync::Arc;

/// Called by the orchestrator as a scan progresses.
///
/// All methods have default no-op implementations so observers only
/// override what they care about. Implementations must be `Send + Sync`.
pub trait ScanObserver: Send + Sync {
    /// The session entered `scanning`.
    ///
    /// # Arguments
    /// * `image_bytes` — size of the raw image
    fn on_scan_start(&self, image_bytes: usize) {
        let _ = image_bytes;
    }

    /// An extraction attempt failed with a retryable error.
    ///
    /// # Arguments
    /// * `attempt`     — 1-indexed attempt that failed
    /// * `max_retries` — retries allowed after the first attempt
    /// * `error`       — human-readable error description
    fn on_attempt_failed(&self, attempt: u32, max_retries: u32, error: &str) {
        let _ = (attempt, max_retries, error);
    }

    /// The session reached `success`.
    fn on_scan_complete(&self, record: &BusinessCardRecord) {
        let _ = record;
    }

    /// The session reached `error`.
    fn on_scan_error(&self, message: &str) {
        let _ = message;
    }

    /// An entry was appended to history.
    ///
    /// # Arguments
    /// * `entry`         — the new entry
    /// * `history_len`   — entries in history after the save
    fn on_history_saved(&self, entry: &HistoryEntry, history_len: usize) {
        let _ = (entry, history_len);
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopScanObserver;

impl ScanObserver for NoopScanObserver {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ScanObserverRef = Arc<dyn ScanObserver>;
