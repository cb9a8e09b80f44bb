//! Apply-pass error taxonomy.
//!
//! Hard variants abort the owning instance's pass; soft variants are reported
//! to the error board and the pass continues. Everything is flattened to a
//! `(path, message)` pair at the instance boundary before it reaches the
//! board, so hosts never match on these variants directly.

use thiserror::Error;

use crate::host::{HostError, ParseDiagnostic};

// ============================================================================
// ApplyError
// ============================================================================

/// Errors produced while loading a definition or applying it to a live tree.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Source text could not be parsed into definitions.
    #[error("parse failed: {0}")]
    Parse(#[from] ParseDiagnostic),

    /// A definition violates the per-kind property schema.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An explicitly named node could not be resolved on the host instance.
    #[error("field `{field}` could not be resolved: {source}")]
    FieldResolution { field: String, source: HostError },

    /// A constraint names a target that is absent from this pass.
    #[error("constraint target `{name}` not found")]
    ConstraintTarget { name: String },

    /// The registration's constraint sink refused an exported constraint.
    #[error("constraint export `{name}` was rejected by the host")]
    ConstraintExport { name: String },

    /// A property failed to apply to one node. Soft: the pass continues.
    #[error("property `{property}` failed on `{node}`: {detail}")]
    PropertyApplication {
        node: String,
        property: String,
        detail: String,
    },

    /// The filesystem watch could not be established or maintained.
    #[error("watch failed: {0}")]
    Watch(#[from] notify::Error),

    /// A host capability failed outside property application.
    #[error("host operation failed: {0}")]
    Host(#[from] HostError),
}

impl ApplyError {
    /// Soft errors are reported but never abort a pass.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::PropertyApplication { .. })
    }
}
