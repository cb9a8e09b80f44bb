//! Node tree model and identity.

use serde::{Deserialize, Serialize};

use super::layout::{ConstraintSpec, LayoutSpec};
use super::property::{Property, PropertyValue};

// ============================================================================
// Identity
// ============================================================================

/// How a node is identified across reload passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeIdentity {
    /// Bound to a host field; resolved through the registration's resolver
    /// and reused across passes. Never pruned.
    Field(String),
    /// Named in the definition; the live node is synthesized on demand and
    /// addressed as `named_<id>`.
    LayoutId(String),
    /// Unnamed; a fresh node is generated every pass and pruned by the next.
    Anonymous,
}

// ============================================================================
// Kinds
// ============================================================================

/// Closed set of node kinds the engine can reconcile.
///
/// Containerness is schema-derived: only [`NodeKind::is_container`] kinds may
/// carry children, and validation rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    View,
    Container,
    Stack,
    Scroll,
    Label,
    Button,
    Image,
    TextField,
    Toggle,
    Slider,
    Progress,
}

impl NodeKind {
    /// Kinds that may carry children.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Container | Self::Stack | Self::Scroll)
    }

    /// Kind name as used in generated node identities (`temp_<kind>_<n>`).
    pub fn name(self) -> &'static str {
        match self {
            Self::View => "View",
            Self::Container => "Container",
            Self::Stack => "Stack",
            Self::Scroll => "Scroll",
            Self::Label => "Label",
            Self::Button => "Button",
            Self::Image => "Image",
            Self::TextField => "TextField",
            Self::Toggle => "Toggle",
            Self::Slider => "Slider",
            Self::Progress => "Progress",
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// One node of a definition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub identity: NodeIdentity,
    pub kind: NodeKind,
    /// Style names resolved before the node's own properties apply.
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub layout: LayoutSpec,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            identity: NodeIdentity::Anonymous,
            kind,
            styles: Vec::new(),
            properties: Vec::new(),
            layout: LayoutSpec::default(),
            children: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.identity = NodeIdentity::Field(name.into());
        self
    }

    pub fn layout_id(mut self, id: impl Into<String>) -> Self {
        self.identity = NodeIdentity::LayoutId(id.into());
        self
    }

    pub fn style(mut self, name: impl Into<String>) -> Self {
        self.styles.push(name.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push(Property::new(name, value));
        self
    }

    pub fn constraint(mut self, spec: ConstraintSpec) -> Self {
        self.layout.constraints.push(spec);
        self
    }

    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    /// Nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Node::subtree_len)
            .sum::<usize>()
    }
}
