//! Change pipeline.
//!
//! One single-consumer worker serializes everything that mutates live state:
//!
//! ```text
//! WatchHub --notify::Event--> Debouncer --flush--> parse --> DefinitionRegistry
//!                                                                  |
//! Session --WorkerMsg-----------------------------------+   RefreshNote
//!                                                       v          v
//!                                               ReloadWorker::apply (per pass)
//! ```
//!
//! Apply passes run per instance in arrival order, so two passes never
//! interleave on one tree. A pass is reconcile (node phase) then constraint
//! build plus an atomic set swap; only after both succeed are the previous
//! pass's generated nodes pruned. Any hard failure rolls the pass back and
//! leaves the previous tree and constraint set standing.
//!
//! # Module Structure
//!
//! - `messages` - worker messages, session events, registrations
//! - `instance` - per-instance state the worker keeps between passes
//! - `mod.rs` - the worker loop and apply orchestration (this file)

pub mod instance;
pub mod messages;


pub use instance::{InstanceEntry, InstancePhase};
pub use messages::{ApplyRequest, InstanceId, Registration, SessionEvent, WorkerMsg};

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::config::ReloadConfig;
use crate::constraint;
use crate::definition::Definition;
use crate::environment::Environment;
use crate::error::ApplyError;
use crate::host::{LiveHost, SourceParser};
use crate::logger::{status_error, status_success, status_unchanged, status_warning};
use crate::reconcile::{self, SoftIssue};
use crate::registry::debounce::{ChangeKind, Debouncer};
use crate::registry::watch::normalize_path;
use crate::registry::{DefinitionRegistry, RefreshNote, WatchGuard, WatchHub};
use crate::report::ErrorBoard;
use crate::style::{StyleResolver, StyleStore};

// ============================================================================
// Worker
// ============================================================================

/// Single consumer of every change source: session commands, registry
/// refresh notes, and raw watch events.
pub struct ReloadWorker<H: LiveHost> {
    host: H,
    parser: Box<dyn SourceParser>,
    config: ReloadConfig,
    registry: Arc<DefinitionRegistry>,
    styles: StyleStore,
    board: Arc<ErrorBoard>,
    hub: Arc<WatchHub>,
    environment: Environment,
    instances: FxHashMap<InstanceId, InstanceEntry<H>>,
    debouncer: Debouncer,
    cmd_rx: UnboundedReceiver<WorkerMsg<H>>,
    notes_tx: UnboundedSender<RefreshNote>,
    notes_rx: UnboundedReceiver<RefreshNote>,
    fs_rx: UnboundedReceiver<notify::Event>,
    events_tx: UnboundedSender<SessionEvent>,
    /// Normalized style source paths from the config.
    style_paths: FxHashSet<PathBuf>,
    /// Keep style-source watches alive for the worker's lifetime.
    style_guards: Vec<WatchGuard>,
}

impl<H: LiveHost> ReloadWorker<H> {
    /// The watcher starts here, so changes made between construction and
    /// [`run`](Self::run) buffer instead of getting lost.
    pub(crate) fn new(
        host: H,
        parser: Box<dyn SourceParser>,
        config: ReloadConfig,
        registry: Arc<DefinitionRegistry>,
        board: Arc<ErrorBoard>,
        cmd_rx: UnboundedReceiver<WorkerMsg<H>>,
        events_tx: UnboundedSender<SessionEvent>,
    ) -> Result<Self, notify::Error> {
        let (fs_tx, fs_rx) = unbounded_channel();
        let hub = Arc::new(WatchHub::new(fs_tx)?);
        let (notes_tx, notes_rx) = unbounded_channel();
        let debouncer = Debouncer::new(config.watch.debounce(), config.watch.cooldown());

        let environment = Environment::default().with_theme(config.themes.default.clone());

        let mut worker = Self {
            host,
            parser,
            config,
            registry,
            styles: StyleStore::new(),
            board,
            hub,
            environment,
            instances: FxHashMap::default(),
            debouncer,
            cmd_rx,
            notes_tx,
            notes_rx,
            fs_rx,
            events_tx,
            style_paths: FxHashSet::default(),
            style_guards: Vec::new(),
        };
        worker.init_style_sources();
        Ok(worker)
    }

    /// Run until shutdown or until the session side hangs up.
    pub async fn run(mut self) {
        crate::debug!("apply"; "reload worker running");
        loop {
            let wait = self.debouncer.sleep_duration();
            tokio::select! {
                biased;
                msg = self.cmd_rx.recv() => match msg {
                    None | Some(WorkerMsg::Shutdown) => break,
                    Some(msg) => self.handle(msg),
                },
                note = self.notes_rx.recv() => {
                    if let Some(note) = note {
                        self.handle_note(note);
                    }
                }
                event = self.fs_rx.recv() => {
                    if let Some(event) = event {
                        self.debouncer.add_event(&event);
                    }
                }
                _ = tokio::time::sleep(wait) => self.flush_changes(),
            }
        }
        crate::debug!("apply"; "reload worker stopped");
    }

    fn handle(&mut self, msg: WorkerMsg<H>) {
        match msg {
            WorkerMsg::Register {
                instance,
                registration,
            } => self.register(instance, registration),
            WorkerMsg::Teardown(instance) => self.teardown(instance),
            WorkerMsg::Apply { instance, request } => self.apply(instance, request),
            WorkerMsg::Preload(paths) => {
                for path in paths {
                    self.reload_source(&normalize_path(&path));
                }
            }
            WorkerMsg::SeedStyles(styles) => {
                self.styles.seed(styles);
                self.reapply_all();
            }
            WorkerMsg::SetEnvironment(environment) => {
                self.environment = environment;
                self.reapply_all();
            }
            WorkerMsg::SetTheme(theme) => {
                if self.environment.theme != theme {
                    crate::log!("apply"; "theme -> {theme}");
                    self.environment.theme = theme;
                    self.reapply_all();
                }
            }
            WorkerMsg::ReapplyAll => self.reapply_all(),
            // Handled by the run loop before dispatch
            WorkerMsg::Shutdown => {}
        }
    }

    fn handle_note(&mut self, note: RefreshNote) {
        self.apply(
            note.instance,
            ApplyRequest::Refresh {
                version: note.version,
            },
        );
    }

    // ========================================================================
    // Registration lifecycle
    // ========================================================================

    fn register(&mut self, id: InstanceId, registration: Registration<H>) {
        let path = normalize_path(&registration.path);
        let guard = match self.hub.register(&path) {
            Ok(guard) => Some(guard),
            Err(err) => {
                self.board.report(&path, format!("watch failed: {err}"));
                crate::log!("watch"; "could not watch {}: {err}", path.display());
                None
            }
        };

        let type_name = registration.type_name.clone();
        self.registry.subscribe(&type_name, id, self.notes_tx.clone());
        self.instances
            .insert(id, InstanceEntry::new(registration, path.clone(), guard));
        crate::debug!("apply"; "registered {type_name} {id} from {}", path.display());

        // Initial apply. A cache entry fed by the same source is reused;
        // anything else means this source has to be parsed first.
        match self.registry.get(&type_name) {
            Some(cache) if cache.source.as_ref() == path.as_path() => {
                self.apply(
                    id,
                    ApplyRequest::Refresh {
                        version: cache.version,
                    },
                );
            }
            _ => self.reload_source(&path),
        }
    }

    fn teardown(&mut self, id: InstanceId) {
        let Some(mut entry) = self.instances.remove(&id) else {
            return;
        };
        self.registry.unsubscribe(&entry.type_name, id);

        let _ = self.host.deactivate(&entry.constraints);
        for handle in entry.constraints.drain(..) {
            let _ = self.host.drop_constraint(handle);
        }
        for node in entry.generated.drain(..) {
            let _ = self.host.remove_node(node);
        }
        for (_, (node, _)) in entry.named.drain() {
            let _ = self.host.remove_node(node);
        }

        // The watch guard drops with the entry, releasing its directory
        // refcount.
        crate::debug!("watch"; "tore down {} {id}", entry.type_name);
        let _ = self.events_tx.send(SessionEvent::TornDown { instance: id });
    }

    // ========================================================================
    // Source loading
    // ========================================================================

    /// Reparse one definition source and fan the result out through the
    /// registry. `path` must already be normalized.
    fn reload_source(&mut self, path: &Path) {
        self.set_phase(path, InstancePhase::Parsing);
        self.board.reset_path(path);

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                self.load_failed(path, format!("read failed: {err}"));
                return;
            }
        };

        let definitions = match self.parser.parse(path, &text) {
            Ok(definitions) => definitions,
            Err(diagnostic) => {
                self.load_failed(path, diagnostic.to_string());
                return;
            }
        };

        let mut blocked = false;
        for definition in &definitions {
            match definition.validate() {
                Ok(warnings) => {
                    for warning in warnings {
                        crate::log!("registry"; "{}: {warning}", definition.type_name);
                    }
                }
                Err(errors) => {
                    blocked = true;
                    self.board
                        .report(path, format!("{}: {errors}", definition.type_name));
                }
            }
        }
        if blocked {
            status_error(
                &path.display().to_string(),
                "definition blocked by validation",
            );
            self.set_phase(path, InstancePhase::Errored);
            let _ = self.events_tx.send(SessionEvent::LoadFailed {
                path: path.to_path_buf(),
            });
            return;
        }

        if definitions.is_empty() {
            crate::debug!("registry"; "{} carries no definitions", path.display());
            self.set_phase(path, InstancePhase::Watching);
            return;
        }

        let types: Vec<String> = definitions
            .iter()
            .map(|definition| definition.type_name.clone())
            .collect();
        let version = self.registry.put(path, definitions);
        crate::log!("registry"; "loaded {} ({}) at {version}", path.display(), types.join(", "));
        let _ = self.events_tx.send(SessionEvent::Loaded {
            path: path.to_path_buf(),
            types,
            version,
        });
        self.set_phase(path, InstancePhase::Watching);
    }

    fn load_failed(&mut self, path: &Path, message: String) {
        self.board.report(path, message.clone());
        status_error(&path.display().to_string(), &message);
        self.set_phase(path, InstancePhase::Errored);
        let _ = self.events_tx.send(SessionEvent::LoadFailed {
            path: path.to_path_buf(),
        });
    }

    fn set_phase(&mut self, path: &Path, phase: InstancePhase) {
        for entry in self.instances.values_mut() {
            if entry.path == path {
                entry.phase = phase;
            }
        }
    }

    // ========================================================================
    // Watch plumbing
    // ========================================================================

    fn init_style_sources(&mut self) {
        let paths = self.config.styles.paths.clone();
        for path in paths {
            let path = normalize_path(&path);
            match self.hub.register(&path) {
                Ok(guard) => self.style_guards.push(guard),
                Err(err) => {
                    self.board.report(&path, format!("watch failed: {err}"));
                    crate::log!("watch"; "could not watch style source {}: {err}", path.display());
                }
            }
            if path.is_file() {
                self.reload_styles(&path);
            } else {
                crate::debug!("watch"; "style source {} not present yet", path.display());
            }
            self.style_paths.insert(path);
        }
    }

    /// Debounced changes, routed by path: style sources reload the store and
    /// force everything, definition sources reparse, anything else is noise
    /// from sharing a directory with watched files.
    fn flush_changes(&mut self) {
        let Some(changes) = self.debouncer.take_if_ready() else {
            return;
        };

        crate::debug_do! {
            let summary: Vec<String> = changes
                .iter()
                .map(|(path, kind)| format!("{} {}", kind.label(), path.display()))
                .collect();
            crate::debug!("watch"; "flushing {} change(s): {}", changes.len(), summary.join(", "));
        }

        for (path, kind) in changes {
            if self.style_paths.contains(&path) {
                if kind == ChangeKind::Removed {
                    status_warning(&format!("style source removed: {}", path.display()));
                    continue;
                }
                self.reload_styles(&path);
                continue;
            }

            if !self.instances.values().any(|entry| entry.path == path) {
                crate::debug!("watch"; "ignoring {}", path.display());
                continue;
            }
            if kind == ChangeKind::Removed {
                status_warning(&format!(
                    "source removed, keeping last good state: {}",
                    path.display()
                ));
                continue;
            }
            self.reload_source(&path);
        }
    }

    fn reload_styles(&mut self, path: &Path) {
        self.board.reset_path(path);
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                self.board.report(path, format!("read failed: {err}"));
                return;
            }
        };

        match self.parser.parse_styles(path, &text) {
            Ok(styles) => {
                let count = styles.len();
                self.styles.update_source(path, styles);
                crate::log!("watch"; "reloaded {count} styles from {}", path.display());
                let _ = self.events_tx.send(SessionEvent::StylesUpdated {
                    path: path.to_path_buf(),
                    count,
                });
                self.reapply_all();
            }
            Err(diagnostic) => {
                self.board.report(path, diagnostic.to_string());
                status_error(&path.display().to_string(), &diagnostic.to_string());
            }
        }
    }

    // ========================================================================
    // Apply passes
    // ========================================================================

    fn reapply_all(&mut self) {
        let mut ids: Vec<InstanceId> = self.instances.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.apply(id, ApplyRequest::Force);
        }
    }

    fn apply(&mut self, id: InstanceId, request: ApplyRequest) {
        let Some(entry) = self.instances.get(&id) else {
            // Torn down while the request was in flight
            crate::debug!("apply"; "instance {id} gone, dropping request");
            return;
        };
        let type_name = entry.type_name.clone();

        let Some(cache) = self.registry.get(&type_name) else {
            crate::debug!("apply"; "no cached definition for {type_name}, skipping {id}");
            return;
        };

        if let ApplyRequest::Refresh { version } = request {
            if entry.last_version == Some(version) {
                status_unchanged(&format!("{type_name} {id} already at {version}"));
                return;
            }
        }

        let Self {
            host,
            instances,
            styles,
            board,
            environment,
            events_tx,
            ..
        } = self;
        let Some(entry) = instances.get_mut(&id) else {
            return;
        };

        entry.phase = InstancePhase::Applying;
        match run_pass(host, entry, cache.definition.as_ref(), styles, environment) {
            Ok(report) => {
                entry.phase = InstancePhase::Watching;
                entry.last_version = Some(cache.version);
                for issue in &report.soft {
                    board.report(&entry.path, format!("`{}`: {}", issue.node, issue.message));
                }
                status_success(&format!(
                    "applied {type_name} {} ({} nodes, {} constraints)",
                    cache.version, report.nodes, report.constraints
                ));
                let _ = events_tx.send(SessionEvent::Applied {
                    instance: id,
                    type_name,
                    version: cache.version,
                    nodes: report.nodes,
                    constraints: report.constraints,
                });
            }
            Err(err) => {
                entry.phase = InstancePhase::Errored;
                board.report(&entry.path, err.to_string());
                status_error(&format!("apply {type_name} {id}"), &err.to_string());
                let _ = events_tx.send(SessionEvent::ApplyFailed {
                    instance: id,
                    type_name,
                });
            }
        }
    }
}

// ============================================================================
// Pass orchestration
// ============================================================================

struct PassReport {
    nodes: usize,
    constraints: usize,
    soft: Vec<SoftIssue>,
}

/// Reconcile, build constraints, swap the set, then prune. Every failure
/// path undoes whatever this pass created before returning.
fn run_pass<H: LiveHost>(
    host: &mut H,
    entry: &mut InstanceEntry<H>,
    definition: &Definition,
    styles: &dyn StyleResolver,
    environment: &Environment,
) -> Result<PassReport, ApplyError> {
    let recon = reconcile::reconcile(
        host,
        entry.root,
        definition,
        &entry.named,
        entry.resolver.as_ref(),
        styles,
        environment,
    )?;
    let node_count = recon.nodes.len();

    let built = match constraint::build(host, &recon.nodes, environment, entry.sink.as_mut()) {
        Ok(built) => built,
        Err(err) => {
            for node in recon.created {
                let _ = host.remove_node(node);
            }
            return Err(err);
        }
    };

    // Atomic swap: previous set off, new set on, then retire old handles.
    if let Err(err) = host.deactivate(&entry.constraints) {
        for handle in built.handles {
            let _ = host.drop_constraint(handle);
        }
        for node in recon.created {
            let _ = host.remove_node(node);
        }
        return Err(err.into());
    }
    if let Err(err) = host.activate(&built.handles) {
        let _ = host.deactivate(&built.handles);
        for handle in built.handles {
            let _ = host.drop_constraint(handle);
        }
        let _ = host.activate(&entry.constraints);
        for node in recon.created {
            let _ = host.remove_node(node);
        }
        return Err(err.into());
    }
    for handle in entry.constraints.drain(..) {
        let _ = host.drop_constraint(handle);
    }
    entry.constraints = built.handles;

    // Both phases committed: now the previous generation can go, along with
    // named nodes the definition no longer mentions and kind-changed ones.
    for node in entry.generated.drain(..) {
        let _ = host.remove_node(node);
    }
    for node in recon.displaced {
        let _ = host.remove_node(node);
    }
    for (name, (node, _)) in std::mem::take(&mut entry.named) {
        if !recon.named.contains_key(&name) {
            let _ = host.remove_node(node);
        }
    }
    entry.named = recon.named;
    entry.generated = recon.generated;

    Ok(PassReport {
        nodes: node_count,
        constraints: entry.constraints.len(),
        soft: recon.soft,
    })
}
