//! Per-instance worker state.

use rustc_hash::FxHashMap;
use std::path::PathBuf;

use super::messages::Registration;
use crate::definition::NodeKind;
use crate::host::{ConstraintSink, FieldResolver, LiveHost};
use crate::registry::{LoadVersion, WatchGuard};

/// Where an instance currently is in its reload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePhase {
    /// Idle, waiting for source changes.
    Watching,
    /// Its source is being reparsed.
    Parsing,
    /// An apply pass is running.
    Applying,
    /// The last pass failed; the previous live state still stands.
    Errored,
}

/// Everything the worker keeps for one registered instance.
pub struct InstanceEntry<H: LiveHost> {
    pub type_name: String,
    /// Normalized definition source path.
    pub path: PathBuf,
    pub root: H::NodeId,
    pub resolver: Box<dyn FieldResolver<H::NodeId>>,
    pub sink: Option<ConstraintSink<H>>,
    /// Keeps the source's directory watch alive.
    pub guard: Option<WatchGuard>,
    pub phase: InstancePhase,
    /// Last version applied; refreshes carrying it again are skipped.
    pub last_version: Option<LoadVersion>,
    /// Persisted named nodes by display name (`named_<id>`).
    pub named: FxHashMap<String, (H::NodeId, NodeKind)>,
    /// Anonymous nodes from the last committed pass; pruned by the next one.
    pub generated: Vec<H::NodeId>,
    /// Handles of the active constraint set.
    pub constraints: Vec<H::ConstraintId>,
}

impl<H: LiveHost> InstanceEntry<H> {
    pub fn new(
        registration: Registration<H>,
        path: PathBuf,
        guard: Option<WatchGuard>,
    ) -> Self {
        Self {
            type_name: registration.type_name,
            path,
            root: registration.root,
            resolver: registration.resolver,
            sink: registration.sink,
            guard,
            phase: InstancePhase::Watching,
            last_version: None,
            named: FxHashMap::default(),
            generated: Vec::new(),
            constraints: Vec::new(),
        }
    }
}
