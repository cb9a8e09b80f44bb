//! Node-tree reconciliation (first apply phase).
//!
//! Walks a definition tree against the live tree and makes the live side
//! match: field nodes resolve through the registration's resolver, named
//! nodes (`named_<id>`) are synthesized once and reused across passes, and
//! anonymous nodes (`temp_<Kind>_<n>`) are generated fresh every pass. Every
//! child is re-inserted under its parent even when reused; insertion moves an
//! existing child to the end, so sibling order always ends up matching
//! definition order.
//!
//! Failures split hard and soft. A missing field or a host failure aborts the
//! pass and the walker removes every node it created, leaving the previous
//! tree standing. Property and style failures are collected as
//! [`SoftIssue`]s and the walk continues.

use rustc_hash::FxHashMap;

use crate::definition::{Definition, Node, NodeIdentity, NodeKind, Style};
use crate::environment::Environment;
use crate::error::ApplyError;
use crate::host::{FieldResolver, LiveHost};
use crate::style::{StyleContext, StyleResolver};

// ============================================================================
// Output
// ============================================================================

/// One definition node paired with its live counterpart for this pass.
pub struct ReconciledNode<'a, H: LiveHost> {
    /// Display name: the field name, `named_<id>`, or `temp_<Kind>_<n>`.
    pub name: String,
    pub node: &'a Node,
    pub live: H::NodeId,
    /// Live parent this pass (the registration root for top-level nodes).
    pub parent: H::NodeId,
}

/// Non-fatal problem found while reconciling one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftIssue {
    /// Display name of the affected node, or `root`.
    pub node: String,
    pub message: String,
}

/// Everything the constraint phase and the commit step need to know about a
/// finished walk.
pub struct ReconcileOutput<'a, H: LiveHost> {
    pub nodes: Vec<ReconciledNode<'a, H>>,
    /// Named nodes referenced this pass, keyed by display name. Replaces the
    /// instance's previous map on commit; stale entries are pruned then.
    pub named: FxHashMap<String, (H::NodeId, NodeKind)>,
    /// Anonymous nodes created this pass. The previous generation is pruned
    /// only after the constraint phase also succeeds.
    pub generated: Vec<H::NodeId>,
    /// Every node this walk created (rollback list on later failure).
    pub created: Vec<H::NodeId>,
    /// Old named nodes replaced because their kind changed. Still attached;
    /// removed only on commit so a failed pass keeps them intact.
    pub displaced: Vec<H::NodeId>,
    pub soft: Vec<SoftIssue>,
}

impl<H: LiveHost> ReconcileOutput<'_, H> {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            named: FxHashMap::default(),
            generated: Vec::new(),
            created: Vec::new(),
            displaced: Vec::new(),
            soft: Vec::new(),
        }
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Reconcile `definition` under `root`.
///
/// On error every node created by this walk has already been removed; the
/// caller only ever commits a fully reconciled tree.
pub fn reconcile<'a, H: LiveHost>(
    host: &mut H,
    root: H::NodeId,
    definition: &'a Definition,
    previous_named: &FxHashMap<String, (H::NodeId, NodeKind)>,
    resolver: &dyn FieldResolver<H::NodeId>,
    styles: &dyn StyleResolver,
    environment: &Environment,
) -> Result<ReconcileOutput<'a, H>, ApplyError> {
    let local_styles: FxHashMap<&str, &Style> = definition
        .styles
        .iter()
        .map(|style| (style.name.as_str(), style))
        .collect();

    let mut walk = Walk {
        host,
        resolver,
        styles,
        local_styles,
        environment,
        previous: previous_named,
        out: ReconcileOutput::new(),
        temp_counter: 0,
    };

    let result = walk.run(root, definition);
    let Walk { host, mut out, .. } = walk;

    match result {
        Ok(()) => Ok(out),
        Err(err) => {
            for id in out.created.drain(..) {
                let _ = host.remove_node(id);
            }
            Err(err)
        }
    }
}

// ============================================================================
// Walker
// ============================================================================

struct Walk<'w, 'a, H: LiveHost> {
    host: &'w mut H,
    resolver: &'w dyn FieldResolver<H::NodeId>,
    styles: &'w dyn StyleResolver,
    local_styles: FxHashMap<&'a str, &'a Style>,
    environment: &'w Environment,
    previous: &'w FxHashMap<String, (H::NodeId, NodeKind)>,
    out: ReconcileOutput<'a, H>,
    temp_counter: u32,
}

impl<'a, H: LiveHost> Walk<'_, 'a, H> {
    fn run(&mut self, root: H::NodeId, definition: &'a Definition) -> Result<(), ApplyError> {
        for property in &definition.properties {
            if let Err(err) = self.host.apply_property(root, property) {
                self.out.soft.push(SoftIssue {
                    node: "root".to_string(),
                    message: format!("property `{}` failed: {err}", property.name),
                });
            }
        }

        for child in &definition.children {
            self.node(child, root)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &'a Node, parent: H::NodeId) -> Result<(), ApplyError> {
        let (name, live) = self.realize(node)?;

        self.host.insert_child(parent, live)?;
        self.apply_styles(&name, node, live);
        self.apply_properties(&name, node, live);

        self.out.nodes.push(ReconciledNode {
            name,
            node,
            live,
            parent,
        });

        for child in &node.children {
            self.node(child, live)?;
        }
        Ok(())
    }

    /// Map a definition node to a live node per its identity.
    fn realize(&mut self, node: &'a Node) -> Result<(String, H::NodeId), ApplyError> {
        match &node.identity {
            NodeIdentity::Field(field) => {
                let live =
                    self.resolver
                        .resolve(field)
                        .map_err(|source| ApplyError::FieldResolution {
                            field: field.clone(),
                            source,
                        })?;
                Ok((field.clone(), live))
            }
            NodeIdentity::LayoutId(id) => {
                let name = format!("named_{id}");
                // Reuse only while the kind still matches; a kind change
                // displaces the old node (removed on commit).
                if let Some(&(live, kind)) = self.previous.get(&name) {
                    if kind == node.kind {
                        self.out.named.insert(name.clone(), (live, kind));
                        return Ok((name, live));
                    }
                    self.out.displaced.push(live);
                }
                let live = self.host.create_node(node.kind)?;
                self.out.created.push(live);
                self.out.named.insert(name.clone(), (live, node.kind));
                Ok((name, live))
            }
            NodeIdentity::Anonymous => {
                self.temp_counter += 1;
                let name = format!("temp_{}_{}", node.kind.name(), self.temp_counter);
                let live = self.host.create_node(node.kind)?;
                self.out.created.push(live);
                self.out.generated.push(live);
                Ok((name, live))
            }
        }
    }

    /// Styles resolve before the node's own properties; definition-local
    /// styles shadow shared names.
    fn apply_styles(&mut self, name: &str, node: &'a Node, live: H::NodeId) {
        for style_name in &node.styles {
            let properties = if let Some(style) = self.local_styles.get(style_name.as_str()) {
                style.resolved(&self.environment.theme)
            } else {
                let ctx = StyleContext {
                    theme: &self.environment.theme,
                    kind: Some(node.kind),
                };
                match self
                    .styles
                    .resolve(std::slice::from_ref(style_name), &ctx)
                {
                    Ok(properties) => properties,
                    Err(err) => {
                        self.out.soft.push(SoftIssue {
                            node: name.to_string(),
                            message: format!("{err}"),
                        });
                        continue;
                    }
                }
            };

            for property in &properties {
                if let Err(err) = self.host.apply_property(live, property) {
                    self.out.soft.push(SoftIssue {
                        node: name.to_string(),
                        message: format!(
                            "property `{}` from style `{style_name}` failed: {err}",
                            property.name
                        ),
                    });
                }
            }
        }
    }

    fn apply_properties(&mut self, name: &str, node: &'a Node, live: H::NodeId) {
        for property in &node.properties {
            if let Err(err) = self.host.apply_property(live, property) {
                self.out.soft.push(SoftIssue {
                    node: name.to_string(),
                    message: format!("property `{}` failed: {err}", property.name),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Color, NodeKind, Property, PropertyValue};
    use crate::host::MapResolver;
    use crate::host::memory::MemoryHost;
    use crate::style::StyleStore;

    fn env() -> Environment {
        Environment::default()
    }

    fn run<'a>(
        host: &mut MemoryHost,
        root: crate::host::memory::MemoryNodeId,
        definition: &'a Definition,
        previous: &FxHashMap<String, (crate::host::memory::MemoryNodeId, NodeKind)>,
        resolver: &MapResolver<crate::host::memory::MemoryNodeId>,
    ) -> Result<ReconcileOutput<'a, MemoryHost>, ApplyError> {
        let styles = StyleStore::new();
        reconcile(host, root, definition, previous, resolver, &styles, &env())
    }

    #[test]
    fn test_anonymous_nodes_fresh_each_pass() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card")
            .child(Node::new(NodeKind::View))
            .child(Node::new(NodeKind::Label));

        let previous = FxHashMap::default();
        let resolver = MapResolver::new();

        let first = run(&mut host, root, &definition, &previous, &resolver).unwrap();
        assert_eq!(first.generated.len(), 2);
        assert_eq!(first.nodes[0].name, "temp_View_1");
        assert_eq!(first.nodes[1].name, "temp_Label_2");

        let second = run(&mut host, root, &definition, &previous, &resolver).unwrap();
        assert_eq!(second.generated.len(), 2);
        assert_ne!(first.generated[0], second.generated[0]);
        // Counter restarts every pass
        assert_eq!(second.nodes[0].name, "temp_View_1");
    }

    #[test]
    fn test_named_nodes_reused() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition =
            Definition::new("Card").child(Node::new(NodeKind::Container).layout_id("box"));

        let resolver = MapResolver::new();
        let first = run(&mut host, root, &definition, &FxHashMap::default(), &resolver).unwrap();
        let (first_id, _) = first.named["named_box"];

        let second = run(&mut host, root, &definition, &first.named, &resolver).unwrap();
        let (second_id, _) = second.named["named_box"];
        assert_eq!(first_id, second_id);
        assert!(second.created.is_empty());
    }

    #[test]
    fn test_named_kind_change_displaces() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let resolver = MapResolver::new();

        let as_container =
            Definition::new("Card").child(Node::new(NodeKind::Container).layout_id("box"));
        let first = run(&mut host, root, &as_container, &FxHashMap::default(), &resolver).unwrap();
        let (old_id, _) = first.named["named_box"];

        let as_stack = Definition::new("Card").child(Node::new(NodeKind::Stack).layout_id("box"));
        let second = run(&mut host, root, &as_stack, &first.named, &resolver).unwrap();
        let (new_id, kind) = second.named["named_box"];

        assert_ne!(old_id, new_id);
        assert_eq!(kind, NodeKind::Stack);
        assert_eq!(second.displaced, vec![old_id]);
        // The displaced node is still alive until the caller commits
        assert!(host.contains(old_id));
    }

    #[test]
    fn test_field_nodes_resolve_and_are_never_created() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let title = host.add_root(Some(NodeKind::Label));
        let resolver = MapResolver::new().with("title", title);

        let definition = Definition::new("Card").child(
            Node::new(NodeKind::Label)
                .field("title")
                .prop("text", PropertyValue::Text("hello".into())),
        );

        let out = run(&mut host, root, &definition, &FxHashMap::default(), &resolver).unwrap();
        assert!(out.created.is_empty());
        assert_eq!(out.nodes[0].live, title);
        assert_eq!(
            host.property_of(title, "text"),
            Some(PropertyValue::Text("hello".into()))
        );
        assert_eq!(host.children_of(root), vec![title]);
    }

    #[test]
    fn test_missing_field_is_hard_and_rolls_back() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let resolver = MapResolver::new();

        let definition = Definition::new("Card")
            .child(Node::new(NodeKind::View))
            .child(Node::new(NodeKind::Label).field("title"));

        let before = host.node_count();
        let err = run(&mut host, root, &definition, &FxHashMap::default(), &resolver)
            .err()
            .unwrap();
        assert!(matches!(err, ApplyError::FieldResolution { .. }));
        // The View created before the failure is gone again
        assert_eq!(host.node_count(), before);
        assert!(host.children_of(root).is_empty());
    }

    #[test]
    fn test_sibling_order_follows_definition() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let resolver = MapResolver::new();

        let first_order = Definition::new("Card")
            .child(Node::new(NodeKind::Container).layout_id("a"))
            .child(Node::new(NodeKind::Container).layout_id("b"));
        let first = run(&mut host, root, &first_order, &FxHashMap::default(), &resolver).unwrap();
        let (a, _) = first.named["named_a"];
        let (b, _) = first.named["named_b"];
        assert_eq!(host.children_of(root), vec![a, b]);

        // Swapped definition order moves the reused nodes
        let second_order = Definition::new("Card")
            .child(Node::new(NodeKind::Container).layout_id("b"))
            .child(Node::new(NodeKind::Container).layout_id("a"));
        run(&mut host, root, &second_order, &first.named, &resolver).unwrap();
        assert_eq!(host.children_of(root), vec![b, a]);
    }

    #[test]
    fn test_property_failures_are_soft() {
        let mut host = MemoryHost::new();
        host.reject_property("opacity");
        let root = host.add_root(None);
        let resolver = MapResolver::new();

        let definition = Definition::new("Card").child(
            Node::new(NodeKind::View)
                .prop("opacity", PropertyValue::Float(0.5))
                .prop("hidden", PropertyValue::Bool(true)),
        );

        let out = run(&mut host, root, &definition, &FxHashMap::default(), &resolver).unwrap();
        assert_eq!(out.soft.len(), 1);
        assert!(out.soft[0].message.contains("opacity"));
        // The later property still applied
        assert_eq!(
            host.property_of(out.nodes[0].live, "hidden"),
            Some(PropertyValue::Bool(true))
        );
    }

    #[test]
    fn test_local_styles_shadow_shared() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let resolver = MapResolver::new();

        let styles = StyleStore::new();
        styles.seed(vec![Style::new(
            "accent",
            vec![Property::color("background_color", Color::BLACK)],
        )]);

        let definition = Definition::new("Card")
            .style(Style::new(
                "accent",
                vec![Property::color("background_color", Color::WHITE)],
            ))
            .child(Node::new(NodeKind::View).style("accent"));

        let out = reconcile(
            &mut host,
            root,
            &definition,
            &FxHashMap::default(),
            &resolver,
            &styles,
            &env(),
        )
        .unwrap();
        assert_eq!(
            host.property_of(out.nodes[0].live, "background_color"),
            Some(PropertyValue::Color(Color::WHITE))
        );
    }

    #[test]
    fn test_missing_style_is_soft() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let resolver = MapResolver::new();

        let definition =
            Definition::new("Card").child(Node::new(NodeKind::View).style("ghost"));

        let out = run(&mut host, root, &definition, &FxHashMap::default(), &resolver).unwrap();
        assert_eq!(out.soft.len(), 1);
        assert!(out.soft[0].message.contains("ghost"));
        assert_eq!(out.nodes.len(), 1);
    }

    #[test]
    fn test_own_properties_override_styles() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let resolver = MapResolver::new();

        let definition = Definition::new("Card")
            .style(Style::new(
                "dim",
                vec![Property::float("opacity", 0.25)],
            ))
            .child(
                Node::new(NodeKind::View)
                    .style("dim")
                    .prop("opacity", PropertyValue::Float(0.75)),
            );

        let out = run(&mut host, root, &definition, &FxHashMap::default(), &resolver).unwrap();
        assert_eq!(
            host.property_of(out.nodes[0].live, "opacity"),
            Some(PropertyValue::Float(0.75))
        );
    }

    #[test]
    fn test_root_properties_apply_to_registration_root() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let resolver = MapResolver::new();

        let definition =
            Definition::new("Card").prop("background_color", PropertyValue::Color(Color::WHITE));

        run(&mut host, root, &definition, &FxHashMap::default(), &resolver).unwrap();
        assert_eq!(
            host.property_of(root, "background_color"),
            Some(PropertyValue::Color(Color::WHITE))
        );
    }
}
