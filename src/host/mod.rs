//! Host capability seams.
//!
//! The engine never touches a UI toolkit. Everything it needs from the host
//! is injected through the traits here:
//!
//! - [`LiveHost`] - node creation/insertion/removal, property application,
//!   content priorities, layout guides, constraint handles.
//! - [`FieldResolver`] - lookup of explicitly named nodes on a registered
//!   instance (a generated lookup table, not reflection).
//! - [`SourceParser`] - definition and style sources to typed models.
//! - [`ConstraintSink`] - per-registration callback receiving exported
//!   constraints.
//!
//! [`MemoryHost`](memory::MemoryHost) is the bundled arena-backed
//! implementation, used by headless hosts and the test suite.

pub mod memory;

use std::fmt;
use std::hash::Hash;
use std::path::Path;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::definition::{Anchor, Definition, GuideKind, NodeKind, Property, Relation, Style};

// ============================================================================
// HostError
// ============================================================================

/// Failure detail surfaced by a host capability.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("unknown node id")]
    UnknownNode,

    #[error("unknown constraint id")]
    UnknownConstraint,

    #[error("field `{field}` not found on host instance")]
    MissingField { field: String },

    #[error("field `{field}` has the wrong type: {detail}")]
    FieldType { field: String, detail: String },

    #[error("{0}")]
    Other(String),
}

impl HostError {
    pub fn other(detail: impl Into<String>) -> Self {
        Self::Other(detail.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

// ============================================================================
// ParseDiagnostic
// ============================================================================

/// What the injected parser reports when a source cannot be loaded.
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    pub message: String,
    pub line: Option<u32>,
}

impl ParseDiagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {line})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseDiagnostic {}

// ============================================================================
// Parser seam
// ============================================================================

/// Turns source text into typed models. One definition source may carry
/// several component types.
pub trait SourceParser: Send {
    fn parse(&self, path: &Path, source: &str) -> Result<Vec<Definition>, ParseDiagnostic>;

    /// Shared style sources. Parsers that only handle definitions keep the
    /// default and style paths simply cannot be configured for them.
    fn parse_styles(&self, path: &Path, source: &str) -> Result<Vec<Style>, ParseDiagnostic> {
        let _ = source;
        Err(ParseDiagnostic::new(format!(
            "style sources are not supported by this parser: {}",
            path.display()
        )))
    }
}

// ============================================================================
// Field resolution
// ============================================================================

/// Resolves explicitly named nodes on one registered instance.
pub trait FieldResolver<Id>: Send {
    fn resolve(&self, field: &str) -> Result<Id, HostError>;
}

impl<Id, F> FieldResolver<Id> for F
where
    F: Fn(&str) -> Result<Id, HostError> + Send,
{
    fn resolve(&self, field: &str) -> Result<Id, HostError> {
        self(field)
    }
}

/// Table-backed resolver: the host generates a name-to-node map once at
/// registration time.
pub struct MapResolver<Id> {
    fields: FxHashMap<String, Id>,
}

impl<Id: Copy + Send> MapResolver<Id> {
    pub fn new() -> Self {
        Self {
            fields: FxHashMap::default(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, id: Id) -> Self {
        self.fields.insert(field.into(), id);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, id: Id) {
        self.fields.insert(field.into(), id);
    }
}

impl<Id: Copy + Send> Default for MapResolver<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Copy + Send> FieldResolver<Id> for MapResolver<Id> {
    fn resolve(&self, field: &str) -> Result<Id, HostError> {
        self.fields
            .get(field)
            .copied()
            .ok_or_else(|| HostError::missing_field(field))
    }
}

impl<Id: Copy + Send> FromIterator<(String, Id)> for MapResolver<Id> {
    fn from_iter<T: IntoIterator<Item = (String, Id)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Resolved constraints
// ============================================================================

/// What a targeted constraint resolved to: a fixed constant or another
/// node's anchor with offset and multiplier baked in.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTarget<Id> {
    /// Literal value; on edge anchors hosts read it as container-relative.
    Constant(f64),
    Anchor {
        node: Id,
        anchor: Anchor,
        offset: f64,
        multiplier: f64,
    },
}

/// A fully resolved constraint handed to the host. No definition context is
/// needed to install it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConstraint<Id> {
    pub node: Id,
    pub anchor: Anchor,
    pub relation: Relation,
    pub target: ResolvedTarget<Id>,
    /// Numeric priority; 1000 is required.
    pub priority: f32,
}

// ============================================================================
// LiveHost
// ============================================================================

/// Mutating capabilities over the live node tree.
///
/// All calls happen on the pipeline's execution context; implementations
/// never need internal locking for engine traffic.
pub trait LiveHost {
    type NodeId: Copy + Eq + Hash + fmt::Debug + Send;
    type ConstraintId: Clone + fmt::Debug + Send;

    fn create_node(&mut self, kind: NodeKind) -> Result<Self::NodeId, HostError>;

    /// Append `child` under `parent`. Re-inserting an existing child moves it
    /// to the end; the reconciler re-inserts every child each pass so final
    /// sibling order always matches definition order.
    fn insert_child(&mut self, parent: Self::NodeId, child: Self::NodeId)
    -> Result<(), HostError>;

    /// Detach a subtree. Tolerant of already-removed ids.
    fn remove_node(&mut self, node: Self::NodeId) -> Result<(), HostError>;

    fn apply_property(&mut self, node: Self::NodeId, property: &Property)
    -> Result<(), HostError>;

    fn set_compression(
        &mut self,
        node: Self::NodeId,
        horizontal: f32,
        vertical: f32,
    ) -> Result<(), HostError>;

    fn set_hugging(
        &mut self,
        node: Self::NodeId,
        horizontal: f32,
        vertical: f32,
    ) -> Result<(), HostError>;

    /// Anchorable guide of `parent`. Guides live as long as their owner.
    fn guide(&mut self, parent: Self::NodeId, kind: GuideKind)
    -> Result<Self::NodeId, HostError>;

    /// Build a constraint handle. Created inactive; the engine activates
    /// whole generations atomically.
    fn make_constraint(
        &mut self,
        constraint: &ResolvedConstraint<Self::NodeId>,
    ) -> Result<Self::ConstraintId, HostError>;

    fn activate(&mut self, constraints: &[Self::ConstraintId]) -> Result<(), HostError>;

    /// Tolerant of handles whose nodes are already gone.
    fn deactivate(&mut self, constraints: &[Self::ConstraintId]) -> Result<(), HostError>;

    /// Release a retired or never-activated handle.
    fn drop_constraint(&mut self, constraint: Self::ConstraintId) -> Result<(), HostError>;
}

/// Per-registration sink for exported constraints. Returning `false` rejects
/// the export and fails the pass.
pub type ConstraintSink<H> =
    Box<dyn FnMut(&str, <H as LiveHost>::ConstraintId) -> bool + Send>;
