//! Definition registry.
//!
//! # Module Structure
//!
//! ```text
//! registry/
//! ├── watch      # Refcounted notify watch hub + RAII guards
//! ├── debounce   # Change burst debouncing
//! └── mod.rs     # Type-keyed definition cache + subscriptions (this file)
//! ```
//!
//! The cache maps component type names to their latest parsed definition,
//! stamped with a monotonically increasing [`LoadVersion`]. A failed reparse
//! never touches the cache: the stale definition keeps serving until a good
//! one replaces it. Writes happen only on the pipeline's execution context;
//! host threads read through `DashMap` without locking the pipeline.

pub mod debounce;
pub mod watch;

pub use watch::{WatchGuard, WatchHub};

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;

use crate::definition::Definition;
use crate::pipeline::InstanceId;

// ============================================================================
// Versions and entries
// ============================================================================

/// Monotonic version minted on every successful load.
///
/// Equality is the dedup rule: an instance that already applied a version
/// skips a refresh carrying the same one. Forced reapplies bypass the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadVersion(u64);

impl LoadVersion {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LoadVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Cached definition for one component type.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub definition: Arc<Definition>,
    pub version: LoadVersion,
    pub source: Arc<Path>,
}

/// Notification pushed to a subscriber when its type reloads.
#[derive(Debug, Clone, Copy)]
pub struct RefreshNote {
    pub instance: InstanceId,
    pub version: LoadVersion,
}

// ============================================================================
// Registry
// ============================================================================

/// Type-keyed definition cache with per-type subscriptions.
pub struct DefinitionRegistry {
    cache: DashMap<String, CacheEntry>,
    subscribers: Mutex<FxHashMap<String, Vec<(InstanceId, UnboundedSender<RefreshNote>)>>>,
    next_version: AtomicU64,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            subscribers: Mutex::new(FxHashMap::default()),
            next_version: AtomicU64::new(0),
        }
    }

    pub fn get(&self, type_name: &str) -> Option<CacheEntry> {
        self.cache.get(type_name).map(|entry| entry.clone())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.cache.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Replace the entries for every definition parsed from `source`.
    ///
    /// The whole batch shares one freshly minted version (a source reparses
    /// as a unit). Subscribers of each replaced type get a [`RefreshNote`];
    /// dead subscribers are pruned on the way.
    pub fn put(&self, source: &Path, definitions: Vec<Definition>) -> LoadVersion {
        let version = LoadVersion(self.next_version.fetch_add(1, Ordering::Relaxed) + 1);
        let source: Arc<Path> = Arc::from(source);

        let mut touched = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let type_name = definition.type_name.clone();
            self.cache.insert(
                type_name.clone(),
                CacheEntry {
                    definition: Arc::new(definition),
                    version,
                    source: Arc::clone(&source),
                },
            );
            touched.push(type_name);
        }

        let mut subscribers = self.subscribers.lock();
        for type_name in &touched {
            if let Some(list) = subscribers.get_mut(type_name) {
                list.retain(|(instance, sender)| {
                    sender
                        .send(RefreshNote {
                            instance: *instance,
                            version,
                        })
                        .is_ok()
                });
            }
        }

        version
    }

    /// Register interest in a type. One note per future `put` touching it.
    pub fn subscribe(
        &self,
        type_name: &str,
        instance: InstanceId,
        sender: UnboundedSender<RefreshNote>,
    ) {
        self.subscribers
            .lock()
            .entry(type_name.to_string())
            .or_default()
            .push((instance, sender));
    }

    pub fn unsubscribe(&self, type_name: &str, instance: InstanceId) {
        let mut subscribers = self.subscribers.lock();
        if let Some(list) = subscribers.get_mut(type_name) {
            list.retain(|(id, _)| *id != instance);
            if list.is_empty() {
                subscribers.remove(type_name);
            }
        }
    }

    pub fn subscriber_count(&self, type_name: &str) -> usize {
        self.subscribers
            .lock()
            .get(type_name)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
