//! Layout model: anchors, targets, priorities, constraint specs.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::condition::Condition;

// ============================================================================
// Priorities
// ============================================================================

/// Constraint priority classes.
///
/// Numeric values follow the usual layout-engine convention: anything below
/// `Required` is breakable under conflict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Required,
    High,
    Medium,
    Low,
    Custom(f32),
}

impl Priority {
    pub fn numeric(self) -> f32 {
        match self {
            Self::Required => 1000.0,
            Self::High => 750.0,
            Self::Medium => 500.0,
            Self::Low => 250.0,
            Self::Custom(value) => value,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Required
    }
}

/// Content priorities for one node, per axis.
///
/// `None` falls back to the per-kind default (compression high, hugging low).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisPriorities {
    pub horizontal: Option<Priority>,
    pub vertical: Option<Priority>,
}

// ============================================================================
// Anchors and targets
// ============================================================================

/// Anchorable attribute of a node or guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Top,
    Bottom,
    Leading,
    Trailing,
    Left,
    Right,
    Width,
    Height,
    CenterX,
    CenterY,
    FirstBaseline,
    LastBaseline,
    /// Width and height in one spec; expands to two constraints.
    Size,
}

impl Anchor {
    pub fn name(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Leading => "leading",
            Self::Trailing => "trailing",
            Self::Left => "left",
            Self::Right => "right",
            Self::Width => "width",
            Self::Height => "height",
            Self::CenterX => "center_x",
            Self::CenterY => "center_y",
            Self::FirstBaseline => "first_baseline",
            Self::LastBaseline => "last_baseline",
            Self::Size => "size",
        }
    }
}

/// Host-provided layout guides a constraint may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideKind {
    SafeArea,
    ReadableContent,
}

impl GuideKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::SafeArea => "safe_area",
            Self::ReadableContent => "readable_content",
        }
    }
}

/// What a targeted constraint is anchored to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A node bound to a host field.
    Field(String),
    /// A node carrying a layout id.
    LayoutId(String),
    /// The source node's parent in this pass.
    Parent,
    /// The source node itself (aspect-ratio style constraints).
    This,
    /// A guide of the source node's parent.
    Guide(GuideKind),
}

impl Target {
    /// Symbolic name used in target-resolution errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Field(name) => name.clone(),
            Self::LayoutId(id) => format!("named_{id}"),
            Self::Parent => "parent".to_string(),
            Self::This => "self".to_string(),
            Self::Guide(guide) => guide.name().to_string(),
        }
    }
}

/// Constraint relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Equal,
    /// Greater than or equal.
    AtLeast,
    /// Less than or equal.
    AtMost,
}

// ============================================================================
// Constraint specs
// ============================================================================

/// Constant or targeted constraint payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Fixed constant; valid on any anchor.
    Constant(f64),
    Targeted {
        target: Target,
        /// Anchor on the target; `None` mirrors the source anchor.
        target_anchor: Option<Anchor>,
        offset: f64,
        multiplier: f64,
    },
}

/// One declarative constraint attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    /// Exported name; handed to the registration's sink after build.
    #[serde(default)]
    pub export: Option<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
    pub anchor: Anchor,
    pub relation: Relation,
    pub kind: ConstraintKind,
    #[serde(default)]
    pub priority: Priority,
}

impl ConstraintSpec {
    /// Fixed-constant constraint (`width = 44`).
    pub fn constant(anchor: Anchor, value: f64) -> Self {
        Self {
            export: None,
            condition: None,
            anchor,
            relation: Relation::Equal,
            kind: ConstraintKind::Constant(value),
            priority: Priority::Required,
        }
    }

    /// Targeted constraint anchored to the same attribute on the target.
    pub fn targeted(anchor: Anchor, target: Target) -> Self {
        Self {
            export: None,
            condition: None,
            anchor,
            relation: Relation::Equal,
            kind: ConstraintKind::Targeted {
                target,
                target_anchor: None,
                offset: 0.0,
                multiplier: 1.0,
            },
            priority: Priority::Required,
        }
    }

    pub fn export(mut self, name: impl Into<String>) -> Self {
        self.export = Some(name.into());
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relation = relation;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn target_anchor(mut self, anchor: Anchor) -> Self {
        if let ConstraintKind::Targeted { target_anchor, .. } = &mut self.kind {
            *target_anchor = Some(anchor);
        }
        self
    }

    pub fn offset(mut self, value: f64) -> Self {
        if let ConstraintKind::Targeted { offset, .. } = &mut self.kind {
            *offset = value;
        }
        self
    }

    pub fn multiplier(mut self, value: f64) -> Self {
        if let ConstraintKind::Targeted { multiplier, .. } = &mut self.kind {
            *multiplier = value;
        }
        self
    }
}

/// Layout description attached to a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutSpec {
    #[serde(default)]
    pub compression: AxisPriorities,
    #[serde(default)]
    pub hugging: AxisPriorities,
    #[serde(default)]
    pub constraints: SmallVec<[ConstraintSpec; 4]>,
}

impl LayoutSpec {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
            && self.compression == AxisPriorities::default()
            && self.hugging == AxisPriorities::default()
    }
}
