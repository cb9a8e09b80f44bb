//! Pipeline message and event types.
//!
//! ```text
//! Session --WorkerMsg--> ReloadWorker --SessionEvent--> embedding host
//!                           ^      ^
//!              RefreshNote  |      |  notify::Event
//!              (registry)          (watch hub)
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::definition::Style;
use crate::environment::Environment;
use crate::host::{ConstraintSink, FieldResolver, HostError, LiveHost};
use crate::registry::LoadVersion;

// ============================================================================
// Instance handles
// ============================================================================

/// Opaque handle for one registered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Everything the host hands over for one instance.
pub struct Registration<H: LiveHost> {
    pub type_name: String,
    /// Definition source backing this instance.
    pub path: PathBuf,
    /// Host node the definition's children reconcile under.
    pub root: H::NodeId,
    pub resolver: Box<dyn FieldResolver<H::NodeId>>,
    /// Receives exported constraints. `None` means exports go nowhere.
    pub sink: Option<ConstraintSink<H>>,
}

impl<H: LiveHost> Registration<H> {
    /// Registration with no fields and no sink. Definitions using field
    /// identities fail their pass until [`resolver`](Self::resolver) is set.
    pub fn new(
        type_name: impl Into<String>,
        path: impl Into<PathBuf>,
        root: H::NodeId,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            path: path.into(),
            root,
            resolver: Box::new(|field: &str| -> Result<H::NodeId, HostError> {
                Err(HostError::missing_field(field))
            }),
            sink: None,
        }
    }

    pub fn resolver(mut self, resolver: impl FieldResolver<H::NodeId> + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn sink(
        mut self,
        sink: impl FnMut(&str, H::ConstraintId) -> bool + Send + 'static,
    ) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
}

impl<H: LiveHost> fmt::Debug for Registration<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("type_name", &self.type_name)
            .field("path", &self.path)
            .field("root", &self.root)
            .field("sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Worker messages
// ============================================================================

/// How an apply pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyRequest {
    /// Apply the cached definition unless `version` was already applied.
    Refresh { version: LoadVersion },
    /// Apply unconditionally (environment switches, explicit reapply).
    Force,
}

/// Messages to the reload worker.
pub enum WorkerMsg<H: LiveHost> {
    /// Bring a new instance under management and run its initial apply.
    Register {
        instance: InstanceId,
        registration: Registration<H>,
    },
    /// Tear an instance down (its token was dropped).
    Teardown(InstanceId),
    /// Run an apply pass for one instance.
    Apply {
        instance: InstanceId,
        request: ApplyRequest,
    },
    /// Parse sources into the cache ahead of registrations.
    Preload(Vec<PathBuf>),
    /// Host-provided styles, not tied to any watched source.
    SeedStyles(Vec<Style>),
    /// Swap the environment snapshot and reapply everything.
    SetEnvironment(Environment),
    /// Swap the active theme and reapply everything.
    SetTheme(String),
    /// Forced reapply of every registered instance.
    ReapplyAll,
    Shutdown,
}

impl<H: LiveHost> fmt::Debug for WorkerMsg<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register {
                instance,
                registration,
            } => f
                .debug_struct("Register")
                .field("instance", instance)
                .field("registration", registration)
                .finish(),
            Self::Teardown(instance) => f.debug_tuple("Teardown").field(instance).finish(),
            Self::Apply { instance, request } => f
                .debug_struct("Apply")
                .field("instance", instance)
                .field("request", request)
                .finish(),
            Self::Preload(paths) => f.debug_tuple("Preload").field(paths).finish(),
            Self::SeedStyles(styles) => {
                f.debug_tuple("SeedStyles").field(&styles.len()).finish()
            }
            Self::SetEnvironment(environment) => {
                f.debug_tuple("SetEnvironment").field(environment).finish()
            }
            Self::SetTheme(theme) => f.debug_tuple("SetTheme").field(theme).finish(),
            Self::ReapplyAll => write!(f, "ReapplyAll"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

// ============================================================================
// Session events
// ============================================================================

/// What the pipeline reports back to the embedding host.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A source reparsed cleanly and entered the registry.
    Loaded {
        path: PathBuf,
        types: Vec<String>,
        version: LoadVersion,
    },
    /// A source failed to parse or validate; the cache keeps the last good
    /// definitions.
    LoadFailed { path: PathBuf },
    /// An instance finished a full apply pass.
    Applied {
        instance: InstanceId,
        type_name: String,
        version: LoadVersion,
        nodes: usize,
        constraints: usize,
    },
    /// An apply pass failed; the previous tree and constraint set survive.
    ApplyFailed {
        instance: InstanceId,
        type_name: String,
    },
    /// A watched style source was reloaded.
    StylesUpdated { path: PathBuf, count: usize },
    /// An instance was torn down.
    TornDown { instance: InstanceId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;

    #[test]
    fn test_registration_defaults() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let registration: Registration<MemoryHost> =
            Registration::new("Card", "components/card.def", root);

        assert!(registration.sink.is_none());
        assert!(matches!(
            registration.resolver.resolve("title"),
            Err(HostError::MissingField { .. })
        ));
    }

    #[test]
    fn test_instance_id_display() {
        assert_eq!(format!("{}", InstanceId::new(7)), "#7");
    }
}
