//! Patch - minimal description of surface mutations.

use crate::error::EngineError;
use crate::surface::SurfaceNode;
use crate::types::Value;

/// One mutation kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Replace the node at the path with a new subtree.
    Replace(SurfaceNode),
    /// Set the content of a text node.
    SetText(String),
    /// Set or overwrite an element attribute.
    SetAttr(String, Value),
    /// Drop an element attribute.
    RemoveAttr(String),
    /// Insert a child at the index, shifting later siblings right.
    InsertChild(usize, SurfaceNode),
    /// Remove the child at the index.
    RemoveChild(usize),
    /// Remove the node itself. At the root path this clears the surface.
    Remove,
}

/// A mutation addressed by an absolute child-index path from the root.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchOp {
    pub path: Vec<usize>,
    pub op: Op,
}

/// Ordered list of mutations reconciling one snapshot into the next.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    pub ops: Vec<PatchOp>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn push(&mut self, path: Vec<usize>, op: Op) {
        self.ops.push(PatchOp { path, op });
    }
}

// =============================================================================
// Application
// =============================================================================

/// Apply a patch to a surface tree in place.
///
/// Applying an empty patch touches nothing. A path that does not resolve, or
/// an op against a node of the wrong shape, reports [`EngineError::Patch`].
pub fn apply_to(root: &mut Option<SurfaceNode>, patch: &Patch) -> Result<(), EngineError> {
    for patch_op in &patch.ops {
        apply_op(root, patch_op)?;
    }
    Ok(())
}

fn apply_op(root: &mut Option<SurfaceNode>, patch_op: &PatchOp) -> Result<(), EngineError> {
    let path = &patch_op.path;

    // Whole-tree ops first: they may run against an empty surface.
    if path.is_empty() {
        match &patch_op.op {
            Op::Replace(node) => {
                *root = Some(node.clone());
                return Ok(());
            }
            Op::Remove => {
                *root = None;
                return Ok(());
            }
            _ => {}
        }
    }

    let Some(tree) = root.as_mut() else {
        return Err(EngineError::Patch("op addressed an empty surface".to_string()));
    };

    match &patch_op.op {
        Op::Replace(node) => {
            let slot = node_mut(tree, path)?;
            *slot = node.clone();
        }
        Op::Remove => {
            let (parent, index) = parent_mut(tree, path)?;
            remove_child(parent, index, path)?;
        }
        Op::SetText(text) => match node_mut(tree, path)? {
            SurfaceNode::Text(content) => *content = text.clone(),
            SurfaceNode::Element { .. } => {
                return Err(EngineError::Patch(format!(
                    "SetText at {path:?} hit an element"
                )));
            }
        },
        Op::SetAttr(name, value) => match node_mut(tree, path)? {
            SurfaceNode::Element { attrs, .. } => {
                attrs.insert(name.clone(), value.clone());
            }
            SurfaceNode::Text(_) => {
                return Err(EngineError::Patch(format!(
                    "SetAttr at {path:?} hit a text node"
                )));
            }
        },
        Op::RemoveAttr(name) => match node_mut(tree, path)? {
            SurfaceNode::Element { attrs, .. } => {
                attrs.remove(name);
            }
            SurfaceNode::Text(_) => {
                return Err(EngineError::Patch(format!(
                    "RemoveAttr at {path:?} hit a text node"
                )));
            }
        },
        Op::InsertChild(index, node) => match node_mut(tree, path)? {
            SurfaceNode::Element { children, .. } => {
                let index = (*index).min(children.len());
                children.insert(index, node.clone());
            }
            SurfaceNode::Text(_) => {
                return Err(EngineError::Patch(format!(
                    "InsertChild at {path:?} hit a text node"
                )));
            }
        },
        Op::RemoveChild(index) => {
            let parent = node_mut(tree, path)?;
            remove_child(parent, *index, path)?;
        }
    }

    Ok(())
}

fn node_mut<'a>(
    tree: &'a mut SurfaceNode,
    path: &[usize],
) -> Result<&'a mut SurfaceNode, EngineError> {
    tree.node_at_mut(path)
        .ok_or_else(|| EngineError::Patch(format!("no node at path {path:?}")))
}

fn parent_mut<'a>(
    tree: &'a mut SurfaceNode,
    path: &[usize],
) -> Result<(&'a mut SurfaceNode, usize), EngineError> {
    let (last, parent_path) = path
        .split_last()
        .ok_or_else(|| EngineError::Patch("Remove needs a non-root path here".to_string()))?;
    Ok((node_mut(tree, parent_path)?, *last))
}

fn remove_child(
    parent: &mut SurfaceNode,
    index: usize,
    path: &[usize],
) -> Result<(), EngineError> {
    match parent {
        SurfaceNode::Element { children, .. } if index < children.len() => {
            children.remove(index);
            Ok(())
        }
        SurfaceNode::Element { children, .. } => Err(EngineError::Patch(format!(
            "remove index {index} out of bounds ({} children) near {path:?}",
            children.len()
        ))),
        SurfaceNode::Text(_) => Err(EngineError::Patch(format!(
            "remove near {path:?} hit a text node"
        ))),
    }
}
