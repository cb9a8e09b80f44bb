//! Arena-backed host for headless embedding and tests.
//!
//! Nodes and constraints live in `FxHashMap` arenas keyed by opaque u64
//! handles. Guides are ordinary arena entries flagged `guide`, so they are
//! anchorable like any node but never appear in a parent's child list.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::definition::{GuideKind, NodeKind, Property, PropertyValue, check_property};

use super::{HostError, LiveHost, ResolvedConstraint, ResolvedTarget};

/// Opaque node handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryNodeId(u64);

/// Opaque constraint handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryConstraintId(u64);

#[derive(Debug)]
struct NodeSlot {
    /// `None` for host-provided roots whose kind the engine never sees.
    kind: Option<NodeKind>,
    parent: Option<MemoryNodeId>,
    children: Vec<MemoryNodeId>,
    properties: FxHashMap<String, PropertyValue>,
    compression: (f32, f32),
    hugging: (f32, f32),
    guides: FxHashMap<GuideKind, MemoryNodeId>,
    guide: bool,
}

impl NodeSlot {
    fn new(kind: Option<NodeKind>) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            properties: FxHashMap::default(),
            compression: (750.0, 750.0),
            hugging: (250.0, 250.0),
            guides: FxHashMap::default(),
            guide: false,
        }
    }
}

#[derive(Debug)]
struct ConstraintSlot {
    constraint: ResolvedConstraint<MemoryNodeId>,
    active: bool,
}

/// In-memory [`LiveHost`].
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: FxHashMap<MemoryNodeId, NodeSlot>,
    constraints: FxHashMap<MemoryConstraintId, ConstraintSlot>,
    next_node: u64,
    next_constraint: u64,
    /// Property names `apply_property` refuses (test hook for soft-error
    /// paths).
    reject: FxHashSet<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host-side node creation: registration roots and field-bound nodes.
    pub fn add_root(&mut self, kind: Option<NodeKind>) -> MemoryNodeId {
        let id = self.mint_node();
        self.nodes.insert(id, NodeSlot::new(kind));
        id
    }

    /// Make `apply_property` fail for this property name.
    pub fn reject_property(&mut self, name: impl Into<String>) {
        self.reject.insert(name.into());
    }

    pub fn contains(&self, node: MemoryNodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn children_of(&self, node: MemoryNodeId) -> Vec<MemoryNodeId> {
        self.nodes
            .get(&node)
            .map(|slot| slot.children.clone())
            .unwrap_or_default()
    }

    pub fn property_of(&self, node: MemoryNodeId, name: &str) -> Option<PropertyValue> {
        self.nodes
            .get(&node)
            .and_then(|slot| slot.properties.get(name).cloned())
    }

    pub fn compression_of(&self, node: MemoryNodeId) -> Option<(f32, f32)> {
        self.nodes.get(&node).map(|slot| slot.compression)
    }

    pub fn hugging_of(&self, node: MemoryNodeId) -> Option<(f32, f32)> {
        self.nodes.get(&node).map(|slot| slot.hugging)
    }

    /// Non-guide nodes currently in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.values().filter(|slot| !slot.guide).count()
    }

    pub fn active_constraint_count(&self) -> usize {
        self.constraints.values().filter(|slot| slot.active).count()
    }

    /// All constraint handles still alive, active or not.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Snapshot of the active constraint set, for assertions.
    pub fn active_constraints(&self) -> Vec<ResolvedConstraint<MemoryNodeId>> {
        self.constraints
            .values()
            .filter(|slot| slot.active)
            .map(|slot| slot.constraint.clone())
            .collect()
    }

    fn mint_node(&mut self) -> MemoryNodeId {
        self.next_node += 1;
        MemoryNodeId(self.next_node)
    }

    fn slot(&self, node: MemoryNodeId) -> Result<&NodeSlot, HostError> {
        self.nodes.get(&node).ok_or(HostError::UnknownNode)
    }

    fn slot_mut(&mut self, node: MemoryNodeId) -> Result<&mut NodeSlot, HostError> {
        self.nodes.get_mut(&node).ok_or(HostError::UnknownNode)
    }

    fn collect_subtree(&self, node: MemoryNodeId, out: &mut Vec<MemoryNodeId>) {
        out.push(node);
        if let Some(slot) = self.nodes.get(&node) {
            for guide in slot.guides.values() {
                out.push(*guide);
            }
            for child in &slot.children {
                self.collect_subtree(*child, out);
            }
        }
    }
}

impl LiveHost for MemoryHost {
    type NodeId = MemoryNodeId;
    type ConstraintId = MemoryConstraintId;

    fn create_node(&mut self, kind: NodeKind) -> Result<MemoryNodeId, HostError> {
        let id = self.mint_node();
        self.nodes.insert(id, NodeSlot::new(Some(kind)));
        Ok(id)
    }

    fn insert_child(
        &mut self,
        parent: MemoryNodeId,
        child: MemoryNodeId,
    ) -> Result<(), HostError> {
        self.slot(parent)?;
        let old_parent = self.slot(child)?.parent;

        if let Some(old) = old_parent {
            if let Some(slot) = self.nodes.get_mut(&old) {
                slot.children.retain(|c| *c != child);
            }
        }
        if let Some(slot) = self.nodes.get_mut(&child) {
            slot.parent = Some(parent);
        }
        if let Some(slot) = self.nodes.get_mut(&parent) {
            slot.children.push(child);
        }
        Ok(())
    }

    fn remove_node(&mut self, node: MemoryNodeId) -> Result<(), HostError> {
        if !self.nodes.contains_key(&node) {
            return Ok(());
        }

        let mut doomed = Vec::new();
        self.collect_subtree(node, &mut doomed);

        if let Some(parent) = self.nodes.get(&node).and_then(|slot| slot.parent) {
            if let Some(slot) = self.nodes.get_mut(&parent) {
                slot.children.retain(|c| *c != node);
            }
        }

        let gone: FxHashSet<MemoryNodeId> = doomed.iter().copied().collect();
        for id in &doomed {
            self.nodes.remove(id);
        }

        // Dangling constraints deactivate, as a real view hierarchy would.
        for slot in self.constraints.values_mut() {
            if !slot.active {
                continue;
            }
            let references_gone = gone.contains(&slot.constraint.node)
                || match &slot.constraint.target {
                    ResolvedTarget::Anchor { node, .. } => gone.contains(node),
                    ResolvedTarget::Constant(_) => false,
                };
            if references_gone {
                slot.active = false;
            }
        }
        Ok(())
    }

    fn apply_property(
        &mut self,
        node: MemoryNodeId,
        property: &Property,
    ) -> Result<(), HostError> {
        if self.reject.contains(&property.name) {
            return Err(HostError::other(format!(
                "property `{}` rejected by host",
                property.name
            )));
        }

        let kind = self.slot(node)?.kind;
        if let Some(kind) = kind {
            if let Err(detail) = check_property(kind, property) {
                return Err(HostError::Other(detail));
            }
        }

        let slot = self.slot_mut(node)?;
        slot.properties
            .insert(property.name.clone(), property.value.clone());
        Ok(())
    }

    fn set_compression(
        &mut self,
        node: MemoryNodeId,
        horizontal: f32,
        vertical: f32,
    ) -> Result<(), HostError> {
        self.slot_mut(node)?.compression = (horizontal, vertical);
        Ok(())
    }

    fn set_hugging(
        &mut self,
        node: MemoryNodeId,
        horizontal: f32,
        vertical: f32,
    ) -> Result<(), HostError> {
        self.slot_mut(node)?.hugging = (horizontal, vertical);
        Ok(())
    }

    fn guide(&mut self, parent: MemoryNodeId, kind: GuideKind) -> Result<MemoryNodeId, HostError> {
        if let Some(existing) = self.slot(parent)?.guides.get(&kind) {
            return Ok(*existing);
        }
        let id = self.mint_node();
        let mut slot = NodeSlot::new(None);
        slot.parent = Some(parent);
        slot.guide = true;
        self.nodes.insert(id, slot);
        self.slot_mut(parent)?.guides.insert(kind, id);
        Ok(id)
    }

    fn make_constraint(
        &mut self,
        constraint: &ResolvedConstraint<MemoryNodeId>,
    ) -> Result<MemoryConstraintId, HostError> {
        self.slot(constraint.node)?;
        if let ResolvedTarget::Anchor { node, .. } = &constraint.target {
            self.slot(*node)?;
        }

        self.next_constraint += 1;
        let id = MemoryConstraintId(self.next_constraint);
        self.constraints.insert(
            id,
            ConstraintSlot {
                constraint: constraint.clone(),
                active: false,
            },
        );
        Ok(id)
    }

    fn activate(&mut self, constraints: &[MemoryConstraintId]) -> Result<(), HostError> {
        for id in constraints {
            let slot = self
                .constraints
                .get_mut(id)
                .ok_or(HostError::UnknownConstraint)?;
            slot.active = true;
        }
        Ok(())
    }

    fn deactivate(&mut self, constraints: &[MemoryConstraintId]) -> Result<(), HostError> {
        for id in constraints {
            if let Some(slot) = self.constraints.get_mut(id) {
                slot.active = false;
            }
        }
        Ok(())
    }

    fn drop_constraint(&mut self, constraint: MemoryConstraintId) -> Result<(), HostError> {
        self.constraints.remove(&constraint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Anchor, Color, Relation};

    #[test]
    fn test_insert_moves_to_end() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let a = host.create_node(NodeKind::View).unwrap();
        let b = host.create_node(NodeKind::View).unwrap();

        host.insert_child(root, a).unwrap();
        host.insert_child(root, b).unwrap();
        assert_eq!(host.children_of(root), vec![a, b]);

        // Re-insert shuffles a to the end
        host.insert_child(root, a).unwrap();
        assert_eq!(host.children_of(root), vec![b, a]);
    }

    #[test]
    fn test_remove_subtree() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let stack = host.create_node(NodeKind::Stack).unwrap();
        let label = host.create_node(NodeKind::Label).unwrap();
        host.insert_child(root, stack).unwrap();
        host.insert_child(stack, label).unwrap();

        host.remove_node(stack).unwrap();
        assert!(!host.contains(stack));
        assert!(!host.contains(label));
        assert!(host.children_of(root).is_empty());

        // Idempotent
        host.remove_node(stack).unwrap();
    }

    #[test]
    fn test_property_store_and_reject() {
        let mut host = MemoryHost::new();
        let label = host.create_node(NodeKind::Label).unwrap();

        host.apply_property(label, &Property::text("text", "hi"))
            .unwrap();
        assert_eq!(
            host.property_of(label, "text"),
            Some(PropertyValue::Text("hi".into()))
        );

        host.reject_property("text_color");
        assert!(
            host.apply_property(label, &Property::color("text_color", Color::BLACK))
                .is_err()
        );
    }

    #[test]
    fn test_schema_enforced_for_known_kinds() {
        let mut host = MemoryHost::new();
        let toggle = host.create_node(NodeKind::Toggle).unwrap();
        assert!(
            host.apply_property(toggle, &Property::text("text", "nope"))
                .is_err()
        );
    }

    #[test]
    fn test_constraint_lifecycle() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let view = host.create_node(NodeKind::View).unwrap();
        host.insert_child(root, view).unwrap();

        let resolved = ResolvedConstraint {
            node: view,
            anchor: Anchor::Top,
            relation: Relation::Equal,
            target: ResolvedTarget::Anchor {
                node: root,
                anchor: Anchor::Top,
                offset: 8.0,
                multiplier: 1.0,
            },
            priority: 1000.0,
        };
        let id = host.make_constraint(&resolved).unwrap();
        assert_eq!(host.active_constraint_count(), 0);

        host.activate(&[id]).unwrap();
        assert_eq!(host.active_constraint_count(), 1);

        host.deactivate(&[id]).unwrap();
        host.drop_constraint(id).unwrap();
        assert_eq!(host.active_constraint_count(), 0);
    }

    #[test]
    fn test_removing_node_deactivates_dangling() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let view = host.create_node(NodeKind::View).unwrap();
        host.insert_child(root, view).unwrap();

        let id = host
            .make_constraint(&ResolvedConstraint {
                node: view,
                anchor: Anchor::Width,
                relation: Relation::Equal,
                target: ResolvedTarget::Constant(44.0),
                priority: 1000.0,
            })
            .unwrap();
        host.activate(&[id]).unwrap();

        host.remove_node(view).unwrap();
        assert_eq!(host.active_constraint_count(), 0);
    }

    #[test]
    fn test_guides_are_stable_and_anchorable() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let g1 = host.guide(root, GuideKind::SafeArea).unwrap();
        let g2 = host.guide(root, GuideKind::SafeArea).unwrap();
        assert_eq!(g1, g2);
        assert!(host.children_of(root).is_empty());

        // Guides die with their owner
        host.remove_node(root).unwrap();
        assert!(!host.contains(g1));
    }
}
