//! Render pass execution.
//!
//! One pass: for every render root (a scheduled instance with no scheduled
//! ancestor, parents first) re-invoke the component function, reconcile its
//! child instances by position and type identity, and expand the snapshot
//! into a surface subtree. Descendants always re-render with an ancestor;
//! props derive from the parent's fresh output, so a child renders only
//! after its parent's snapshot exists.
//!
//! The pass is atomic: all work lands in a [`PassState`] staging area and
//! commits only when every root rendered cleanly. On error the staged
//! snapshots are dropped, freshly created instances are rolled back, and
//! the previous snapshot stays authoritative.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::component::ComponentDef;
use crate::effects::{self, EffectDecl};
use crate::error::EngineError;
use crate::reconcile;
use crate::surface::SurfaceNode;
use crate::tree::Node;
use crate::types::Value;

use super::instance::{ChildSlot, DirtyReason, RenderCtx};
use super::registry::{self, InstanceId};

// =============================================================================
// Pass staging
// =============================================================================

#[derive(Default)]
pub(crate) struct PassState {
    staged: Vec<StagedInstance>,
    created: Vec<InstanceId>,
    removed: Vec<InstanceId>,
}

struct StagedInstance {
    id: InstanceId,
    props: Value,
    snapshot: Node,
    children: Vec<ChildSlot>,
    anchor: Vec<usize>,
    effects: Vec<EffectDecl>,
}

// =============================================================================
// Pass driver
// =============================================================================

/// Execute one render pass over the scheduled instances. Returns the render
/// roots in the order they rendered; effect due-checks walk their subtrees.
pub(crate) fn run_pass(
    scheduled: &HashMap<InstanceId, DirtyReason>,
) -> Result<Vec<InstanceId>, EngineError> {
    let mut roots: Vec<InstanceId> = scheduled
        .keys()
        .copied()
        .filter(|id| registry::is_live(*id))
        .filter(|id| !has_scheduled_ancestor(*id, scheduled))
        .collect();
    roots.sort_by_key(|id| registry::depth_of(*id));

    let mut pass = PassState::default();
    let mut outputs: Vec<(Vec<usize>, SurfaceNode)> = Vec::new();

    for root in &roots {
        let reason = scheduled.get(root).copied().unwrap_or(DirtyReason::empty());
        let (props, anchor) =
            registry::with(*root, |instance| (instance.props.clone(), instance.anchor.clone()))?;
        trace!(index = root.index(), ?reason, "render root");
        match render_tree(*root, props, anchor.clone(), &mut pass) {
            Ok(expanded) => outputs.push((anchor, expanded)),
            Err(err) => {
                rollback(&pass);
                return Err(err);
            }
        }
    }

    // Commit: snapshots and child lists first, then destruction of replaced
    // subtrees, then patches.
    for staged in pass.staged {
        registry::with_mut(staged.id, |instance| {
            instance.props = staged.props;
            instance.snapshot = Some(staged.snapshot);
            instance.children = staged.children;
            instance.anchor = staged.anchor;
            effects::commit_decls(&mut instance.effects, staged.effects);
        })?;
    }
    for id in pass.removed {
        debug!(index = id.index(), "destroy replaced instance subtree");
        registry::release(id);
    }

    for (anchor, expanded) in outputs {
        let previous = super::shadow_at(&anchor);
        let patch = reconcile::diff(previous.as_ref(), &expanded, &anchor);
        debug!(ops = patch.len(), anchor = ?anchor, "apply patch");
        super::apply_patch(&patch)?;
        super::shadow_set(&anchor, expanded);
    }

    Ok(roots)
}

fn has_scheduled_ancestor(
    id: InstanceId,
    scheduled: &HashMap<InstanceId, DirtyReason>,
) -> bool {
    let mut cur = id;
    while let Ok(Some(parent)) = registry::parent_of(cur) {
        if scheduled.contains_key(&parent) {
            return true;
        }
        cur = parent;
    }
    false
}

fn rollback(pass: &PassState) {
    for id in &pass.created {
        registry::release(*id);
    }
}

// =============================================================================
// Recursive render + expand
// =============================================================================

/// Render one instance with the given props and expand its snapshot,
/// recursing into child instances. Nothing is committed here.
fn render_tree(
    id: InstanceId,
    props: Value,
    anchor: Vec<usize>,
    pass: &mut PassState,
) -> Result<SurfaceNode, EngineError> {
    let def = registry::with(id, |instance| instance.def.clone())?;
    registry::with_mut(id, |instance| instance.renders += 1)?;
    trace!(component = def.name(), index = id.index(), "render");

    let mut ctx = RenderCtx::new(id, props.clone());
    let snapshot = def.render(&mut ctx)?;
    let effect_decls = ctx.take_effect_decls();

    let old_children = registry::with(id, |instance| instance.children.clone())?;
    let mut new_children = Vec::new();
    let mut pos = Vec::new();
    let expanded = expand_node(
        &snapshot,
        id,
        &anchor,
        &mut pos,
        &old_children,
        &mut new_children,
        pass,
    )?;

    // Old children whose position vanished (or whose slot a different
    // definition took over) go down with their whole subtree.
    for slot in &old_children {
        if !new_children.iter().any(|child| child.id == slot.id) {
            pass.removed.push(slot.id);
        }
    }

    pass.staged.push(StagedInstance {
        id,
        props,
        snapshot,
        children: new_children,
        anchor,
        effects: effect_decls,
    });
    Ok(expanded)
}

/// Expand one snapshot node into a surface node, mounting or updating child
/// instances at component placeholders.
fn expand_node(
    node: &Node,
    owner: InstanceId,
    owner_anchor: &[usize],
    pos: &mut Vec<usize>,
    old_children: &[ChildSlot],
    new_children: &mut Vec<ChildSlot>,
    pass: &mut PassState,
) -> Result<SurfaceNode, EngineError> {
    match node {
        Node::Text(text) => Ok(SurfaceNode::Text(text.clone())),
        Node::Element { tag, attrs, children } => {
            let mut expanded = Vec::with_capacity(children.len());
            for (index, child) in children.iter().enumerate() {
                pos.push(index);
                let result = expand_node(
                    child,
                    owner,
                    owner_anchor,
                    pos,
                    old_children,
                    new_children,
                    pass,
                );
                pos.pop();
                expanded.push(result?);
            }
            Ok(SurfaceNode::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: expanded,
            })
        }
        Node::Component { def, props } => {
            def.validate_props(props)?;

            let existing = old_children.iter().find(|slot| slot.pos == *pos);
            let child = match existing {
                Some(slot) if same_def_as(slot.id, def) => slot.id,
                Some(slot) => {
                    // Type changed at this position: the old subtree is
                    // discarded at commit, state included.
                    trace!(
                        index = slot.id.index(),
                        component = def.name(),
                        "type change at position"
                    );
                    fresh_child(def, props, owner, pass)
                }
                None => fresh_child(def, props, owner, pass),
            };

            new_children.push(ChildSlot {
                pos: pos.clone(),
                id: child,
            });

            let mut child_anchor = owner_anchor.to_vec();
            child_anchor.extend_from_slice(pos);
            render_tree(child, props.clone(), child_anchor, pass)
        }
    }
}

fn same_def_as(id: InstanceId, def: &std::rc::Rc<ComponentDef>) -> bool {
    registry::with(id, |instance| ComponentDef::same_def(&instance.def, def)).unwrap_or(false)
}

fn fresh_child(
    def: &std::rc::Rc<ComponentDef>,
    props: &Value,
    owner: InstanceId,
    pass: &mut PassState,
) -> InstanceId {
    let child = registry::allocate(def.clone(), props.clone(), Some(owner));
    pass.created.push(child);
    child
}
