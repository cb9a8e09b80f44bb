//! Filesystem watch hub.
//!
//! One `notify` watcher serves the whole session. Watches are taken on the
//! parent directory of each registered source (editors atomic-save by
//! rename, which silently kills single-file watches) and refcounted per
//! directory; the pipeline filters flushed changes against the paths it
//! actually cares about.
//!
//! [`WatchGuard`] is the handle: registering returns one, dropping it
//! releases the refcount exactly once, and the OS watch ends when the last
//! guard on a directory goes.
//!
//! Watcher callbacks run on notify's own thread. They only forward raw
//! events into the pipeline channel; all real work happens on the pipeline's
//! execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::log;

/// Absolutize without requiring the path to exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Directory a watched file is observed through.
fn watch_dir(path: &Path) -> PathBuf {
    let path = normalize_path(path);
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or(path)
}

struct HubState {
    watcher: RecommendedWatcher,
    refcounts: FxHashMap<PathBuf, usize>,
}

/// Refcounted watch registry over a single watcher.
pub struct WatchHub {
    state: Mutex<HubState>,
}

impl WatchHub {
    /// Create the watcher up front so events arriving before the pipeline
    /// loop starts are buffered in the channel, not lost.
    pub fn new(events: UnboundedSender<notify::Event>) -> Result<Self, notify::Error> {
        let watcher = RecommendedWatcher::new(
            move |result: Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    let _ = events.send(event);
                }
                Err(err) => {
                    log!("error"; "watcher error: {err}");
                }
            },
            notify::Config::default(),
        )?;

        Ok(Self {
            state: Mutex::new(HubState {
                watcher,
                refcounts: FxHashMap::default(),
            }),
        })
    }

    /// Start (or reuse) the watch covering `path`.
    pub fn register(self: &Arc<Self>, path: &Path) -> Result<WatchGuard, notify::Error> {
        let dir = watch_dir(path);
        let mut state = self.state.lock();

        let count = state.refcounts.get(&dir).copied().unwrap_or(0);
        if count == 0 {
            state.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            crate::debug!("watch"; "watching {}", dir.display());
        }
        state.refcounts.insert(dir.clone(), count + 1);

        Ok(WatchGuard {
            hub: Arc::clone(self),
            dir: Some(dir),
        })
    }

    /// Current refcount for the directory covering `path`.
    pub fn refcount(&self, path: &Path) -> usize {
        let dir = watch_dir(path);
        self.state.lock().refcounts.get(&dir).copied().unwrap_or(0)
    }

    /// Number of directories currently under OS watch.
    pub fn active_watches(&self) -> usize {
        self.state.lock().refcounts.len()
    }

    fn release(&self, dir: &Path) {
        let mut state = self.state.lock();
        let Some(count) = state.refcounts.get(dir).copied() else {
            return;
        };

        if count <= 1 {
            state.refcounts.remove(dir);
            if let Err(err) = state.watcher.unwatch(dir) {
                crate::debug!("watch"; "unwatch {} failed: {err}", dir.display());
            } else {
                crate::debug!("watch"; "unwatched {}", dir.display());
            }
        } else {
            state.refcounts.insert(dir.to_path_buf(), count - 1);
        }
    }
}

/// RAII handle for one registration's share of a watch.
pub struct WatchGuard {
    hub: Arc<WatchHub>,
    /// Taken on drop so release happens exactly once.
    dir: Option<PathBuf>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            self.hub.release(&dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn hub() -> (Arc<WatchHub>, mpsc::UnboundedReceiver<notify::Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(WatchHub::new(tx).unwrap()), rx)
    }

    #[test]
    fn test_refcount_shared_watch() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("card.def");
        std::fs::write(&file, "x").unwrap();

        let (hub, _rx) = hub();
        let first = hub.register(&file).unwrap();
        let second = hub.register(&file).unwrap();

        assert_eq!(hub.refcount(&file), 2);
        assert_eq!(hub.active_watches(), 1);

        drop(first);
        assert_eq!(hub.refcount(&file), 1);
        assert_eq!(hub.active_watches(), 1);

        drop(second);
        assert_eq!(hub.refcount(&file), 0);
        assert_eq!(hub.active_watches(), 0);
    }

    #[test]
    fn test_files_in_same_dir_share_a_watch() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.def");
        let b = temp.path().join("b.def");
        std::fs::write(&a, "x").unwrap();
        std::fs::write(&b, "x").unwrap();

        let (hub, _rx) = hub();
        let _ga = hub.register(&a).unwrap();
        let _gb = hub.register(&b).unwrap();
        assert_eq!(hub.active_watches(), 1);
    }

    #[test]
    fn test_missing_dir_fails_registration() {
        let (hub, _rx) = hub();
        let result = hub.register(Path::new("/definitely/not/here/card.def"));
        assert!(result.is_err());
    }

    #[test]
    fn test_events_flow_into_channel() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("card.def");
        std::fs::write(&file, "one").unwrap();

        let (hub, mut rx) = hub();
        let _guard = hub.register(&file).unwrap();

        std::fs::write(&file, "two").unwrap();

        // Inotify delivery is asynchronous; poll briefly.
        let mut seen = false;
        for _ in 0..50 {
            std::thread::sleep(std::time::Duration::from_millis(10));
            while let Ok(event) = rx.try_recv() {
                if event.paths.iter().any(|p| p.ends_with("card.def")) {
                    seen = true;
                }
            }
            if seen {
                break;
            }
        }
        assert!(seen, "no watch event for card.def");
    }
}
