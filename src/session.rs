//! Session surface.
//!
//! [`ReloadSession`] is the embedding host's handle on the engine. Building
//! one yields the session plus a [`ReloadWorker`] the host spawns on whatever
//! runtime owns its UI; every session call turns into a message on the
//! worker's command channel, so nothing here touches live state directly.
//!
//! ```no_run
//! # use vivify::config::ReloadConfig;
//! # use vivify::host::memory::MemoryHost;
//! # use vivify::host::{SourceParser, ParseDiagnostic};
//! # use vivify::pipeline::Registration;
//! # use vivify::session::ReloadSession;
//! # struct MyParser;
//! # impl SourceParser for MyParser {
//! #     fn parse(&self, _: &std::path::Path, _: &str)
//! #         -> Result<Vec<vivify::definition::Definition>, ParseDiagnostic> { Ok(vec![]) }
//! # }
//! # async fn demo() -> anyhow::Result<()> {
//! let mut host = MemoryHost::new();
//! let root = host.add_root(None);
//!
//! let (session, worker) =
//!     ReloadSession::build(ReloadConfig::default(), Box::new(MyParser), host)?;
//! tokio::spawn(worker.run());
//!
//! let token = session.register(Registration::new("Card", "ui/card.def", root))?;
//! // ... the instance now live-reloads until the token drops.
//! # drop(token);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, bail};
use arc_swap::ArcSwap;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::watch;

use crate::config::ReloadConfig;
use crate::definition::Style;
use crate::environment::Environment;
use crate::host::{LiveHost, SourceParser};
use crate::pipeline::{
    ApplyRequest, InstanceId, Registration, ReloadWorker, SessionEvent, WorkerMsg,
};
use crate::registry::DefinitionRegistry;
use crate::registry::watch::normalize_path;
use crate::report::{ErrorBoard, ErrorSnapshot};

// ============================================================================
// Session
// ============================================================================

/// Handle on one reload engine instance.
///
/// Cheap to share by reference; all methods take `&self` except
/// [`events`](Self::events).
pub struct ReloadSession<H: LiveHost> {
    config: ReloadConfig,
    cmd_tx: UnboundedSender<WorkerMsg<H>>,
    events_rx: Option<UnboundedReceiver<SessionEvent>>,
    board: Arc<ErrorBoard>,
    /// Current environment snapshot, lock-free for host reads. The worker
    /// keeps its own copy; both swap through the same messages.
    environment: ArcSwap<Environment>,
    next_instance: AtomicU64,
}

impl<H: LiveHost> ReloadSession<H> {
    /// Assemble a session and its worker. The watcher starts immediately;
    /// the worker only consumes once the host spawns [`ReloadWorker::run`].
    pub fn build(
        config: ReloadConfig,
        parser: Box<dyn SourceParser>,
        host: H,
    ) -> anyhow::Result<(Self, ReloadWorker<H>)> {
        config.validate().context("invalid reload configuration")?;

        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (events_tx, events_rx) = unbounded_channel();
        let board = Arc::new(ErrorBoard::new());
        let environment = Environment::default().with_theme(config.themes.default.clone());

        let worker = ReloadWorker::new(
            host,
            parser,
            config.clone(),
            Arc::new(DefinitionRegistry::new()),
            Arc::clone(&board),
            cmd_rx,
            events_tx,
        )
        .context("could not start the filesystem watcher")?;

        let session = Self {
            config,
            cmd_tx,
            events_rx: Some(events_rx),
            board,
            environment: ArcSwap::from_pointee(environment),
            next_instance: AtomicU64::new(0),
        };
        Ok((session, worker))
    }

    /// Register one instance. Its initial apply runs as soon as the worker
    /// picks the message up; the returned token tears the instance down on
    /// drop.
    pub fn register(&self, registration: Registration<H>) -> anyhow::Result<InstanceToken<H>> {
        let instance = InstanceId::new(self.next_instance.fetch_add(1, Ordering::Relaxed) + 1);
        self.cmd_tx
            .send(WorkerMsg::Register {
                instance,
                registration,
            })
            .map_err(|_| anyhow::anyhow!("reload worker is gone"))?;
        Ok(InstanceToken {
            instance,
            cmd_tx: self.cmd_tx.clone(),
        })
    }

    /// Parse sources into the definition cache before anything registers
    /// against them.
    pub fn preload(&self, paths: Vec<PathBuf>) {
        let _ = self.cmd_tx.send(WorkerMsg::Preload(paths));
    }

    /// Hand the worker host-provided shared styles. Watched style sources
    /// from the config layer on top of these.
    pub fn seed_styles(&self, styles: Vec<Style>) {
        let _ = self.cmd_tx.send(WorkerMsg::SeedStyles(styles));
    }

    /// Force an apply pass for every registered instance.
    pub fn reapply_all(&self) {
        let _ = self.cmd_tx.send(WorkerMsg::ReapplyAll);
    }

    /// Swap the environment snapshot and reapply everything.
    pub fn set_environment(&self, environment: Environment) {
        self.environment.store(Arc::new(environment.clone()));
        let _ = self.cmd_tx.send(WorkerMsg::SetEnvironment(environment));
    }

    /// Switch the active theme. Fails without side effects when `theme` is
    /// not in the configured catalog.
    pub fn set_theme(&self, theme: impl Into<String>) -> anyhow::Result<()> {
        let theme = theme.into();
        if !self.config.themes.available.contains(&theme) {
            bail!(
                "theme `{theme}` is not in the catalog ({})",
                self.config.themes.available.join(", ")
            );
        }

        let next = (*self.environment.load_full()).clone().with_theme(theme.clone());
        self.environment.store(Arc::new(next));
        let _ = self.cmd_tx.send(WorkerMsg::SetTheme(theme));
        Ok(())
    }

    /// Current environment snapshot.
    pub fn environment(&self) -> Arc<Environment> {
        self.environment.load_full()
    }

    /// Live error feed. Receivers always observe the latest snapshot.
    pub fn errors(&self) -> watch::Receiver<ErrorSnapshot> {
        self.board.subscribe()
    }

    /// Current error list.
    pub fn error_snapshot(&self) -> ErrorSnapshot {
        self.board.snapshot()
    }

    /// Dismiss all errors reported for one source path.
    pub fn reset_error(&self, path: &Path) {
        self.board.reset_path(&normalize_path(path));
    }

    /// Dismiss everything on the error board.
    pub fn reset_errors(&self) {
        self.board.reset_all();
    }

    /// Take the session event stream. Yields `None` after the first call.
    pub fn events(&mut self) -> Option<UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    /// Ask the worker to stop. Idempotent; dropping the session does the
    /// same.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(WorkerMsg::Shutdown);
    }
}

impl<H: LiveHost> Drop for ReloadSession<H> {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WorkerMsg::Shutdown);
    }
}

// ============================================================================
// Instance tokens
// ============================================================================

/// Owning handle for one registered instance. Dropping it is the only way
/// to tear the instance down.
pub struct InstanceToken<H: LiveHost> {
    instance: InstanceId,
    cmd_tx: UnboundedSender<WorkerMsg<H>>,
}

impl<H: LiveHost> InstanceToken<H> {
    pub fn id(&self) -> InstanceId {
        self.instance
    }

    /// Force a fresh apply pass of the cached definition.
    pub fn reapply(&self) {
        let _ = self.cmd_tx.send(WorkerMsg::Apply {
            instance: self.instance,
            request: ApplyRequest::Force,
        });
    }
}

impl<H: LiveHost> Drop for InstanceToken<H> {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WorkerMsg::Teardown(self.instance));
    }
}

impl<H: LiveHost> fmt::Debug for InstanceToken<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InstanceToken").field(&self.instance).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::definition::{Definition, Node, NodeKind, PropertyValue};
    use crate::host::ParseDiagnostic;
    use crate::host::memory::MemoryHost;

    struct JsonParser;

    impl SourceParser for JsonParser {
        fn parse(&self, _path: &Path, source: &str) -> Result<Vec<Definition>, ParseDiagnostic> {
            serde_json::from_str(source)
                .map_err(|err| ParseDiagnostic::new(format!("bad definition json: {err}")))
        }
    }

    fn build_session() -> (ReloadSession<MemoryHost>, ReloadWorker<MemoryHost>) {
        ReloadSession::build(
            ReloadConfig::default(),
            Box::new(JsonParser),
            MemoryHost::new(),
        )
        .unwrap()
    }

    async fn wait_for(
        events: &mut UnboundedReceiver<SessionEvent>,
        predicate: impl Fn(&SessionEvent) -> bool,
    ) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let event = events.recv().await.expect("event stream closed");
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for session event")
    }

    #[test]
    fn test_theme_catalog_is_enforced() {
        let (session, _worker) = build_session();

        // Default catalog only carries "none"
        assert!(session.set_theme("none").is_ok());
        let err = session.set_theme("alien").unwrap_err();
        assert!(err.to_string().contains("alien"));
        assert_eq!(session.environment().theme, "none");
    }

    #[test]
    fn test_theme_switch_updates_snapshot() {
        let mut config = ReloadConfig::default();
        config.themes.available = vec!["none".into(), "night".into()];

        let (session, _worker) =
            ReloadSession::build(config, Box::new(JsonParser), MemoryHost::new()).unwrap();
        session.set_theme("night").unwrap();
        assert_eq!(session.environment().theme, "night");
    }

    #[test]
    fn test_events_taken_once() {
        let (mut session, _worker) = build_session();
        assert!(session.events().is_some());
        assert!(session.events().is_none());
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let (session, _worker) = build_session();
        let mut host = MemoryHost::new();
        let root = host.add_root(None);

        let first = session
            .register(Registration::new("Card", "a.def", root))
            .unwrap();
        let second = session
            .register(Registration::new("Card", "a.def", root))
            .unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_register_and_token_drop_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = normalize_path(temp.path()).join("chip.def");
        let definition = Definition::new("Chip").child(
            Node::new(NodeKind::Label).prop("text", PropertyValue::Text("chip".into())),
        );
        std::fs::write(&path, serde_json::to_string(&[definition]).unwrap()).unwrap();

        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let (mut session, worker) =
            ReloadSession::build(ReloadConfig::default(), Box::new(JsonParser), host).unwrap();
        let handle = tokio::spawn(worker.run());
        let mut events = session.events().unwrap();

        let token = session
            .register(Registration::new("Chip", &path, root))
            .unwrap();
        let id = token.id();

        let applied = wait_for(&mut events, |event| {
            matches!(event, SessionEvent::Applied { .. })
        })
        .await;
        assert!(matches!(
            applied,
            SessionEvent::Applied {
                instance,
                nodes: 1,
                ..
            } if instance == id
        ));

        drop(token);
        let torn = wait_for(&mut events, |event| {
            matches!(event, SessionEvent::TornDown { .. })
        })
        .await;
        assert_eq!(torn, SessionEvent::TornDown { instance: id });

        session.shutdown();
        handle.await.unwrap();
    }
}
