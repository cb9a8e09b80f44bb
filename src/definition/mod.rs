//! Definition data model.
//!
//! # Module Structure
//!
//! ```text
//! definition/
//! ├── node       # Node tree, identities, closed NodeKind set
//! ├── property   # Typed property values
//! ├── layout     # Constraint specs, anchors, priorities
//! ├── condition  # Environment-conditioned constraint inclusion
//! ├── schema     # Per-kind property tables + checks
//! └── mod.rs     # Definition, Style, load-time validation (this file)
//! ```
//!
//! A [`Definition`] is what the injected parser produces for one component
//! type. One source file may carry several definitions. The model is closed:
//! kinds, value shapes and anchors are tagged enums, and [`validate`]
//! (run before a definition enters the registry) rejects anything the schema
//! tables do not declare.
//!
//! [`validate`]: Definition::validate

mod condition;
mod layout;
mod node;
mod property;
mod schema;

pub use condition::{Condition, Statement};
pub use layout::{
    Anchor, AxisPriorities, ConstraintKind, ConstraintSpec, GuideKind, LayoutSpec, Priority,
    Relation, Target,
};
pub use node::{Node, NodeIdentity, NodeKind};
pub use property::{Color, Property, PropertyValue, ValueKind};
pub use schema::{COMMON, KindSchema, PropertySpec, check_common_property, check_property, find, schema};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Styles
// ============================================================================

/// A named, reusable property list.
///
/// `themed` entries layer on top of `properties` when the environment's theme
/// matches; unknown themes fall back to the base list alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub themed: BTreeMap<String, Vec<Property>>,
}

impl Style {
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
            themed: BTreeMap::new(),
        }
    }

    pub fn themed(mut self, theme: impl Into<String>, properties: Vec<Property>) -> Self {
        self.themed.insert(theme.into(), properties);
        self
    }

    /// Base properties followed by the overrides for `theme`, if any.
    pub fn resolved(&self, theme: &str) -> Vec<Property> {
        let mut out = self.properties.clone();
        if let Some(extra) = self.themed.get(theme) {
            out.extend(extra.iter().cloned());
        }
        out
    }
}

// ============================================================================
// Definition
// ============================================================================

/// One component type parsed from a definition source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub type_name: String,
    /// Marks a definition meant to own a whole root view, not a subtree.
    #[serde(default)]
    pub root: bool,
    /// Applied to the registration's root node (common properties only; the
    /// root's kind belongs to the host).
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Definition-local styles; shadow shared styles of the same name.
    #[serde(default)]
    pub styles: Vec<Style>,
    #[serde(default)]
    pub children: Vec<Node>,
    /// Editor metadata; preserved but never applied to live nodes.
    #[serde(default)]
    pub tooling: Vec<Property>,
}

impl Definition {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            root: false,
            properties: Vec::new(),
            styles: Vec::new(),
            children: Vec::new(),
            tooling: Vec::new(),
        }
    }

    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push(Property::new(name, value));
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.styles.push(style);
        self
    }

    /// Schema-check the whole definition.
    ///
    /// Violations are load-blocking: the registry never sees a definition
    /// that fails here. `Ok` carries non-blocking warnings (duplicate
    /// exported constraint names, duplicate layout ids) for the log.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for property in &self.properties {
            if let Err(detail) = check_common_property(property) {
                errors.push(detail);
            }
        }

        let mut exports: FxHashMap<&str, (usize, bool)> = FxHashMap::default();
        let mut layout_ids: FxHashMap<&str, usize> = FxHashMap::default();

        for child in &self.children {
            validate_node(child, &mut errors, &mut exports, &mut layout_ids);
        }

        for (name, (count, all_conditional)) in exports {
            if count > 1 && !all_conditional {
                warnings.push(format!(
                    "constraint `{name}` is exported {count} times without distinguishing conditions"
                ));
            }
        }
        for (id, count) in layout_ids {
            if count > 1 {
                warnings.push(format!("layout id `{id}` appears {count} times"));
            }
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors.join("\n"))
        }
    }
}

fn validate_node<'a>(
    node: &'a Node,
    errors: &mut Vec<String>,
    exports: &mut FxHashMap<&'a str, (usize, bool)>,
    layout_ids: &mut FxHashMap<&'a str, usize>,
) {
    for property in &node.properties {
        if let Err(detail) = check_property(node.kind, property) {
            errors.push(detail);
        }
    }

    if !node.children.is_empty() && !node.kind.is_container() {
        errors.push(format!(
            "{} cannot carry children ({} present)",
            node.kind.name(),
            node.children.len()
        ));
    }

    if let NodeIdentity::LayoutId(id) = &node.identity {
        *layout_ids.entry(id.as_str()).or_insert(0) += 1;
    }

    for spec in &node.layout.constraints {
        if let Some(name) = &spec.export {
            let entry = exports.entry(name.as_str()).or_insert((0, true));
            entry.0 += 1;
            entry.1 &= spec.condition.is_some();
        }
    }

    for child in &node.children {
        validate_node(child, errors, exports, layout_ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_definition_passes() {
        let def = Definition::new("Card")
            .prop("background_color", PropertyValue::Color(Color::WHITE))
            .child(
                Node::new(NodeKind::Label)
                    .field("title")
                    .prop("text", PropertyValue::Text("hello".into())),
            );
        assert_eq!(def.validate().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_children_on_leaf_rejected() {
        let def = Definition::new("Card")
            .child(Node::new(NodeKind::Label).child(Node::new(NodeKind::View)));
        let err = def.validate().unwrap_err();
        assert!(err.contains("Label cannot carry children"));
    }

    #[test]
    fn test_unknown_property_blocks_load() {
        let def = Definition::new("Card")
            .child(Node::new(NodeKind::Label).prop("colr", PropertyValue::Text("red".into())));
        assert!(def.validate().unwrap_err().contains("colr"));
    }

    #[test]
    fn test_duplicate_export_warns() {
        let def = Definition::new("Card").child(
            Node::new(NodeKind::View)
                .constraint(ConstraintSpec::constant(Anchor::Width, 44.0).export("edge"))
                .constraint(ConstraintSpec::constant(Anchor::Height, 44.0).export("edge")),
        );
        let warnings = def.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("`edge`"));
    }

    #[test]
    fn test_conditional_duplicate_export_is_fine() {
        let def = Definition::new("Card").child(
            Node::new(NodeKind::View)
                .constraint(
                    ConstraintSpec::constant(Anchor::Width, 44.0)
                        .export("edge")
                        .when(Condition::always(true)),
                )
                .constraint(
                    ConstraintSpec::constant(Anchor::Width, 60.0)
                        .export("edge")
                        .when(Condition::always(false)),
                ),
        );
        assert!(def.validate().unwrap().is_empty());
    }

    #[test]
    fn test_themed_style_resolution() {
        let style = Style::new(
            "heading",
            vec![Property::float("font_size", 17.0)],
        )
        .themed("night", vec![Property::color("text_color", Color::WHITE)]);

        let base = style.resolved("day");
        assert_eq!(base.len(), 1);

        let night = style.resolved("night");
        assert_eq!(night.len(), 2);
        assert_eq!(night[1].name, "text_color");
    }
}
