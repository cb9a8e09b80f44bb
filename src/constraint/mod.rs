//! Constraint resolution (second apply phase).
//!
//! Runs over the output of a successful reconcile walk. Every node first
//! gets its content priorities (explicit per-axis values, else its kind's
//! schema defaults), then each declarative [`ConstraintSpec`] on it becomes
//! a host constraint handle. Conditions are evaluated against the current
//! environment first; a false condition skips the spec entirely. Symbolic
//! targets resolve by display name among this pass's nodes, so a constraint
//! can anchor to a field, a named node, the parent, the node itself, or a
//! parent guide.
//!
//! Handles come back inactive. The caller swaps whole generations: deactivate
//! the previous set, activate the new one, retire the old handles. When a
//! build fails midway every handle made so far is dropped and the previous
//! set stays untouched.

use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};

use crate::definition::{Anchor, ConstraintKind, ConstraintSpec, Target};
use crate::environment::Environment;
use crate::error::ApplyError;
use crate::host::{ConstraintSink, LiveHost, ResolvedConstraint, ResolvedTarget};
use crate::reconcile::ReconciledNode;

/// Result of a constraint build: the inactive handle set plus the export
/// names delivered to the sink, in delivery order.
pub struct BuiltConstraints<H: LiveHost> {
    pub handles: Vec<H::ConstraintId>,
    pub exports: Vec<String>,
}

impl<H: LiveHost> BuiltConstraints<H> {
    fn new() -> Self {
        Self {
            handles: Vec::new(),
            exports: Vec::new(),
        }
    }
}

/// Build the constraint set for one reconciled pass.
///
/// On error every handle built so far has been dropped again.
pub fn build<H: LiveHost>(
    host: &mut H,
    nodes: &[ReconciledNode<'_, H>],
    environment: &Environment,
    sink: Option<&mut ConstraintSink<H>>,
) -> Result<BuiltConstraints<H>, ApplyError> {
    let mut out = BuiltConstraints::new();
    match build_inner(host, nodes, environment, sink, &mut out) {
        Ok(()) => Ok(out),
        Err(err) => {
            for handle in out.handles.drain(..) {
                let _ = host.drop_constraint(handle);
            }
            Err(err)
        }
    }
}

fn build_inner<H: LiveHost>(
    host: &mut H,
    nodes: &[ReconciledNode<'_, H>],
    environment: &Environment,
    mut sink: Option<&mut ConstraintSink<H>>,
    out: &mut BuiltConstraints<H>,
) -> Result<(), ApplyError> {
    let by_name: FxHashMap<&str, H::NodeId> = nodes
        .iter()
        .map(|rec| (rec.name.as_str(), rec.live))
        .collect();

    for rec in nodes {
        set_priorities(host, rec)?;

        for spec in &rec.node.layout.constraints {
            if let Some(condition) = &spec.condition {
                if !condition.evaluate(environment) {
                    continue;
                }
            }

            for (anchor, suffix) in expand(spec.anchor) {
                let target = resolve_target(host, &by_name, rec, spec, anchor)?;
                let resolved = ResolvedConstraint {
                    node: rec.live,
                    anchor,
                    relation: spec.relation,
                    target,
                    priority: spec.priority.numeric(),
                };

                let handle = host.make_constraint(&resolved)?;
                out.handles.push(handle.clone());

                if let Some(name) = &spec.export {
                    let export_name = match suffix {
                        Some(suffix) => format!("{name}{suffix}"),
                        None => name.clone(),
                    };
                    if let Some(deliver) = sink.as_deref_mut() {
                        if !deliver(&export_name, handle) {
                            return Err(ApplyError::ConstraintExport { name: export_name });
                        }
                    }
                    out.exports.push(export_name);
                }
            }
        }
    }
    Ok(())
}

/// Explicit per-axis priorities, falling back to the kind's schema defaults.
fn set_priorities<H: LiveHost>(
    host: &mut H,
    rec: &ReconciledNode<'_, H>,
) -> Result<(), ApplyError> {
    let schema = crate::definition::schema(rec.node.kind);

    let compression = &rec.node.layout.compression;
    host.set_compression(
        rec.live,
        compression
            .horizontal
            .unwrap_or(schema.default_compression)
            .numeric(),
        compression
            .vertical
            .unwrap_or(schema.default_compression)
            .numeric(),
    )?;

    let hugging = &rec.node.layout.hugging;
    host.set_hugging(
        rec.live,
        hugging
            .horizontal
            .unwrap_or(schema.default_hugging)
            .numeric(),
        hugging
            .vertical
            .unwrap_or(schema.default_hugging)
            .numeric(),
    )?;
    Ok(())
}

/// `size` is sugar for width and height; exports get suffixed per dimension.
fn expand(anchor: Anchor) -> SmallVec<[(Anchor, Option<&'static str>); 2]> {
    match anchor {
        Anchor::Size => smallvec![
            (Anchor::Width, Some("_width")),
            (Anchor::Height, Some("_height")),
        ],
        other => smallvec![(other, None)],
    }
}

fn resolve_target<H: LiveHost>(
    host: &mut H,
    by_name: &FxHashMap<&str, H::NodeId>,
    rec: &ReconciledNode<'_, H>,
    spec: &ConstraintSpec,
    anchor: Anchor,
) -> Result<ResolvedTarget<H::NodeId>, ApplyError> {
    match &spec.kind {
        // Constants pass through untouched; the host decides what a constant
        // means per anchor (edge constants are container-relative).
        ConstraintKind::Constant(value) => Ok(ResolvedTarget::Constant(*value)),
        ConstraintKind::Targeted {
            target,
            target_anchor,
            offset,
            multiplier,
        } => {
            let node = match target {
                Target::Field(field) => lookup(by_name, field.as_str(), target)?,
                Target::LayoutId(id) => {
                    let key = format!("named_{id}");
                    lookup(by_name, &key, target)?
                }
                Target::Parent => rec.parent,
                Target::This => rec.live,
                Target::Guide(kind) => host.guide(rec.parent, *kind)?,
            };

            let target_anchor = match (spec.anchor, *target_anchor) {
                // Both sides of a size constraint expand together
                (Anchor::Size, None | Some(Anchor::Size)) => anchor,
                (Anchor::Size, Some(other)) => {
                    return Err(ApplyError::TypeMismatch(format!(
                        "size constraint cannot target the single anchor `{}`",
                        other.name()
                    )));
                }
                (_, Some(explicit)) => explicit,
                (_, None) => anchor,
            };

            Ok(ResolvedTarget::Anchor {
                node,
                anchor: target_anchor,
                offset: *offset,
                multiplier: *multiplier,
            })
        }
    }
}

fn lookup<Id: Copy>(
    by_name: &FxHashMap<&str, Id>,
    key: &str,
    target: &Target,
) -> Result<Id, ApplyError> {
    by_name
        .get(key)
        .copied()
        .ok_or_else(|| ApplyError::ConstraintTarget {
            name: target.describe(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rustc_hash::FxHashMap;
    use std::sync::Arc;

    use crate::definition::{
        Condition, Definition, GuideKind, Node, NodeKind, Priority, Relation,
    };
    use crate::environment::{DeviceClass, Environment};
    use crate::host::MapResolver;
    use crate::host::memory::{MemoryHost, MemoryNodeId};
    use crate::reconcile::{ReconcileOutput, reconcile};
    use crate::style::StyleStore;

    fn reconciled<'a>(
        host: &mut MemoryHost,
        root: MemoryNodeId,
        definition: &'a Definition,
    ) -> ReconcileOutput<'a, MemoryHost> {
        let styles = StyleStore::new();
        let resolver: MapResolver<MemoryNodeId> = MapResolver::new();
        reconcile(
            host,
            root,
            definition,
            &FxHashMap::default(),
            &resolver,
            &styles,
            &Environment::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_constant_and_parent_targets() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::View)
                .constraint(ConstraintSpec::constant(Anchor::Width, 44.0))
                .constraint(
                    ConstraintSpec::targeted(Anchor::Top, Target::Parent)
                        .offset(8.0)
                        .relation(Relation::AtLeast),
                ),
        );

        let recon = reconciled(&mut host, root, &definition);
        let built = build(&mut host, &recon.nodes, &Environment::default(), None).unwrap();
        assert_eq!(built.handles.len(), 2);
        assert_eq!(host.active_constraint_count(), 0);

        host.activate(&built.handles).unwrap();
        let active = host.active_constraints();
        assert_eq!(active.len(), 2);

        let top = active
            .iter()
            .find(|c| c.anchor == Anchor::Top)
            .unwrap();
        assert_eq!(top.relation, Relation::AtLeast);
        assert_eq!(
            top.target,
            ResolvedTarget::Anchor {
                node: root,
                anchor: Anchor::Top,
                offset: 8.0,
                multiplier: 1.0,
            }
        );
    }

    #[test]
    fn test_named_and_field_targets_resolve_by_display_name() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let avatar = host.add_root(Some(NodeKind::Image));

        let definition = Definition::new("Card")
            .child(Node::new(NodeKind::Image).field("avatar"))
            .child(Node::new(NodeKind::View).layout_id("divider"))
            .child(
                Node::new(NodeKind::Label).constraint(
                    ConstraintSpec::targeted(Anchor::Top, Target::LayoutId("divider".into()))
                        .target_anchor(Anchor::Bottom)
                        .offset(4.0),
                ),
            )
            .child(
                Node::new(NodeKind::Label).constraint(ConstraintSpec::targeted(
                    Anchor::Leading,
                    Target::Field("avatar".into()),
                )),
            );

        let styles = StyleStore::new();
        let resolver = MapResolver::new().with("avatar", avatar);
        let recon = reconcile(
            &mut host,
            root,
            &definition,
            &FxHashMap::default(),
            &resolver,
            &styles,
            &Environment::default(),
        )
        .unwrap();
        let (divider, _) = recon.named["named_divider"];

        let built = build(&mut host, &recon.nodes, &Environment::default(), None).unwrap();
        host.activate(&built.handles).unwrap();

        let active = host.active_constraints();
        let to_divider = active
            .iter()
            .find(|c| c.anchor == Anchor::Top)
            .unwrap();
        assert_eq!(
            to_divider.target,
            ResolvedTarget::Anchor {
                node: divider,
                anchor: Anchor::Bottom,
                offset: 4.0,
                multiplier: 1.0,
            }
        );

        let to_avatar = active
            .iter()
            .find(|c| c.anchor == Anchor::Leading)
            .unwrap();
        assert!(matches!(
            to_avatar.target,
            ResolvedTarget::Anchor { node, .. } if node == avatar
        ));
    }

    #[test]
    fn test_missing_target_fails_and_cleans_up() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::Label)
                .constraint(ConstraintSpec::constant(Anchor::Height, 20.0))
                .constraint(ConstraintSpec::targeted(
                    Anchor::Leading,
                    Target::Field("avatar".into()),
                )),
        );

        let recon = reconciled(&mut host, root, &definition);
        let err = build(&mut host, &recon.nodes, &Environment::default(), None)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ApplyError::ConstraintTarget { ref name } if name == "avatar"
        ));
        // The height handle built before the failure is gone
        assert_eq!(host.constraint_count(), 0);
    }

    #[test]
    fn test_condition_gates_inclusion() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::View)
                .constraint(
                    ConstraintSpec::constant(Anchor::Width, 320.0)
                        .when(Condition::device(DeviceClass::Phone)),
                )
                .constraint(
                    ConstraintSpec::constant(Anchor::Width, 540.0)
                        .when(Condition::device(DeviceClass::Tablet)),
                ),
        );
        let recon = reconciled(&mut host, root, &definition);

        let mut phone = Environment::default();
        phone.device = DeviceClass::Phone;
        let built = build(&mut host, &recon.nodes, &phone, None).unwrap();
        assert_eq!(built.handles.len(), 1);

        host.activate(&built.handles).unwrap();
        assert_eq!(
            host.active_constraints()[0].target,
            ResolvedTarget::Constant(320.0)
        );
    }

    #[test]
    fn test_size_expands_to_two_suffixed_exports() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::Image)
                .constraint(ConstraintSpec::constant(Anchor::Size, 64.0).export("icon")),
        );
        let recon = reconciled(&mut host, root, &definition);

        let delivered: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&delivered);
        let mut sink: ConstraintSink<MemoryHost> =
            Box::new(move |name, _| {
                seen.lock().push(name.to_string());
                true
            });

        let built = build(
            &mut host,
            &recon.nodes,
            &Environment::default(),
            Some(&mut sink),
        )
        .unwrap();
        assert_eq!(built.handles.len(), 2);
        assert_eq!(built.exports, vec!["icon_width", "icon_height"]);
        assert_eq!(*delivered.lock(), vec!["icon_width", "icon_height"]);

        host.activate(&built.handles).unwrap();
        let anchors: Vec<Anchor> = host
            .active_constraints()
            .iter()
            .map(|c| c.anchor)
            .collect();
        assert!(anchors.contains(&Anchor::Width));
        assert!(anchors.contains(&Anchor::Height));
    }

    #[test]
    fn test_sink_rejection_fails_pass() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::View)
                .constraint(ConstraintSpec::constant(Anchor::Width, 44.0).export("edge")),
        );
        let recon = reconciled(&mut host, root, &definition);

        let mut sink: ConstraintSink<MemoryHost> = Box::new(|_, _| false);
        let err = build(
            &mut host,
            &recon.nodes,
            &Environment::default(),
            Some(&mut sink),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            ApplyError::ConstraintExport { ref name } if name == "edge"
        ));
        assert_eq!(host.constraint_count(), 0);
    }

    #[test]
    fn test_guide_target_anchors_to_parent_guide() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::Label).constraint(ConstraintSpec::targeted(
                Anchor::Leading,
                Target::Guide(GuideKind::SafeArea),
            )),
        );
        let recon = reconciled(&mut host, root, &definition);

        let built = build(&mut host, &recon.nodes, &Environment::default(), None).unwrap();
        host.activate(&built.handles).unwrap();

        let guide = host.guide(root, GuideKind::SafeArea).unwrap();
        assert!(matches!(
            host.active_constraints()[0].target,
            ResolvedTarget::Anchor { node, .. } if node == guide
        ));
    }

    #[test]
    fn test_self_target_for_aspect_ratio() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::Image).constraint(
                ConstraintSpec::targeted(Anchor::Width, Target::This)
                    .target_anchor(Anchor::Height)
                    .multiplier(1.5),
            ),
        );
        let recon = reconciled(&mut host, root, &definition);
        let own = recon.nodes[0].live;

        let built = build(&mut host, &recon.nodes, &Environment::default(), None).unwrap();
        host.activate(&built.handles).unwrap();

        assert_eq!(
            host.active_constraints()[0].target,
            ResolvedTarget::Anchor {
                node: own,
                anchor: Anchor::Height,
                offset: 0.0,
                multiplier: 1.5,
            }
        );
    }

    #[test]
    fn test_constant_on_edge_anchor_resolves() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::View).constraint(ConstraintSpec::constant(Anchor::Top, 12.0)),
        );
        let recon = reconciled(&mut host, root, &definition);

        let built = build(&mut host, &recon.nodes, &Environment::default(), None).unwrap();
        assert_eq!(built.handles.len(), 1);

        host.activate(&built.handles).unwrap();
        let active = host.active_constraints();
        assert_eq!(active[0].anchor, Anchor::Top);
        assert_eq!(active[0].target, ResolvedTarget::Constant(12.0));
    }

    #[test]
    fn test_content_priorities_explicit_and_default() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);

        let mut pinned = Node::new(NodeKind::Label);
        pinned.layout.hugging.horizontal = Some(Priority::Required);
        let definition = Definition::new("Card")
            .child(pinned)
            .child(Node::new(NodeKind::Label));

        let recon = reconciled(&mut host, root, &definition);
        build(&mut host, &recon.nodes, &Environment::default(), None).unwrap();

        // Explicit horizontal hugging, default vertical
        assert_eq!(host.hugging_of(recon.nodes[0].live), Some((1000.0, 250.0)));
        // Schema defaults: compression high, hugging low
        assert_eq!(host.compression_of(recon.nodes[1].live), Some((750.0, 750.0)));
        assert_eq!(host.hugging_of(recon.nodes[1].live), Some((250.0, 250.0)));
    }

    #[test]
    fn test_priorities_pass_through_numeric() {
        let mut host = MemoryHost::new();
        let root = host.add_root(None);
        let definition = Definition::new("Card").child(
            Node::new(NodeKind::View).constraint(
                ConstraintSpec::constant(Anchor::Width, 100.0).priority(Priority::Custom(600.0)),
            ),
        );
        let recon = reconciled(&mut host, root, &definition);

        let built = build(&mut host, &recon.nodes, &Environment::default(), None).unwrap();
        host.activate(&built.handles).unwrap();
        assert_eq!(host.active_constraints()[0].priority, 600.0);
    }
}
