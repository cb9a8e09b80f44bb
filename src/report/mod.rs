//! Error aggregation and the live error feed.
//!
//! Every failure the pipeline reports lands here as a `(path, message)` pair.
//! The board keeps one insertion-ordered, deduplicated list; every mutation
//! publishes a fresh snapshot through a `tokio::sync::watch` channel so host
//! overlays can render the current list without polling. A successful reparse
//! of a path clears that path's entries; "dismiss all" maps to
//! [`ErrorBoard::reset_all`].

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// One reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub path: PathBuf,
    pub message: String,
}

/// Immutable view of the board, cheap to clone into overlays.
pub type ErrorSnapshot = Arc<[ErrorEntry]>;

/// Whitespace-insensitive form used for dedup equality.
fn normalize(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Path-keyed error aggregator.
pub struct ErrorBoard {
    entries: Mutex<Vec<ErrorEntry>>,
    feed: watch::Sender<ErrorSnapshot>,
}

impl ErrorBoard {
    pub fn new() -> Self {
        let (feed, _) = watch::channel(ErrorSnapshot::from(Vec::new()));
        Self {
            entries: Mutex::new(Vec::new()),
            feed,
        }
    }

    /// Record a failure. Returns false when an equal entry (same path, same
    /// normalized message) is already on the board.
    pub fn report(&self, path: impl Into<PathBuf>, message: impl Into<String>) -> bool {
        let entry = ErrorEntry {
            path: path.into(),
            message: message.into(),
        };

        let mut entries = self.entries.lock();
        let duplicate = entries.iter().any(|existing| {
            existing.path == entry.path && normalize(&existing.message) == normalize(&entry.message)
        });
        if duplicate {
            return false;
        }

        entries.push(entry);
        self.publish(&entries);
        true
    }

    /// Drop every entry for one path.
    pub fn reset_path(&self, path: &Path) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.path != path);
        if entries.len() != before {
            self.publish(&entries);
        }
    }

    /// Dismiss everything.
    pub fn reset_all(&self) {
        let mut entries = self.entries.lock();
        if !entries.is_empty() {
            entries.clear();
            self.publish(&entries);
        }
    }

    pub fn snapshot(&self) -> ErrorSnapshot {
        ErrorSnapshot::from(self.entries.lock().clone())
    }

    /// Live feed; receivers observe the latest snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<ErrorSnapshot> {
        self.feed.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn publish(&self, entries: &[ErrorEntry]) {
        self.feed.send_replace(ErrorSnapshot::from(entries.to_vec()));
    }
}

impl Default for ErrorBoard {
    fn default() -> Self {
        Self::new()
    }
}
