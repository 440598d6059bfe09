//! Presentation surface.
//!
//! The engine never draws; it hands minimal [`Patch`]es to a [`Surface`].
//! [`MemorySurface`] is the built-in implementation: it materializes the
//! node tree in memory and counts applied ops, which is what the test suite
//! asserts against ("render re-executed but the surface did not change"
//! means zero ops).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::EngineError;
use crate::reconcile::{self, Patch};
use crate::types::Value;

// =============================================================================
// SurfaceNode
// =============================================================================

/// A fully expanded presentation node. Component placeholders are gone by
/// the time a tree reaches the surface.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceNode {
    Element {
        tag: String,
        attrs: BTreeMap<String, Value>,
        children: Vec<SurfaceNode>,
    },
    Text(String),
}

impl SurfaceNode {
    pub fn tag(&self) -> Option<&str> {
        match self {
            SurfaceNode::Element { tag, .. } => Some(tag),
            SurfaceNode::Text(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        match self {
            SurfaceNode::Element { attrs, .. } => attrs.get(name),
            SurfaceNode::Text(_) => None,
        }
    }

    pub fn child(&self, index: usize) -> Option<&SurfaceNode> {
        match self {
            SurfaceNode::Element { children, .. } => children.get(index),
            SurfaceNode::Text(_) => None,
        }
    }

    /// Navigate a child-index path from this node.
    pub fn node_at(&self, path: &[usize]) -> Option<&SurfaceNode> {
        let mut cur = self;
        for &index in path {
            cur = cur.child(index)?;
        }
        Some(cur)
    }

    pub(crate) fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut SurfaceNode> {
        let mut cur = self;
        for &index in path {
            match cur {
                SurfaceNode::Element { children, .. } => {
                    cur = children.get_mut(index)?;
                }
                SurfaceNode::Text(_) => return None,
            }
        }
        Some(cur)
    }

    /// Concatenated text leaves, depth-first. Handy for assertions.
    pub fn text_content(&self) -> String {
        match self {
            SurfaceNode::Text(s) => s.clone(),
            SurfaceNode::Element { children, .. } => {
                children.iter().map(SurfaceNode::text_content).collect()
            }
        }
    }
}

// =============================================================================
// Surface trait
// =============================================================================

/// Anything that can consume patches.
pub trait Surface {
    fn apply(&mut self, patch: &Patch) -> Result<(), EngineError>;
}

// =============================================================================
// MemorySurface
// =============================================================================

/// In-memory surface with mutation accounting.
#[derive(Debug, Default)]
pub struct MemorySurface {
    root: Option<SurfaceNode>,
    ops_applied: usize,
    patches_applied: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle in the shape [`mount`](crate::mount) expects.
    pub fn shared() -> Rc<RefCell<MemorySurface>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn root(&self) -> Option<&SurfaceNode> {
        self.root.as_ref()
    }

    /// Total individual mutations applied so far. An empty patch adds zero.
    pub fn ops_applied(&self) -> usize {
        self.ops_applied
    }

    /// Number of patches received, including empty ones.
    pub fn patches_applied(&self) -> usize {
        self.patches_applied
    }
}

impl Surface for MemorySurface {
    fn apply(&mut self, patch: &Patch) -> Result<(), EngineError> {
        reconcile::apply_to(&mut self.root, patch)?;
        self.ops_applied += patch.len();
        self.patches_applied += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{Op, PatchOp};

    fn leaf(text: &str) -> SurfaceNode {
        SurfaceNode::Text(text.to_string())
    }

    fn elem(tag: &str, children: Vec<SurfaceNode>) -> SurfaceNode {
        SurfaceNode::Element {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            children,
        }
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut surface = MemorySurface::new();
        surface.apply(&Patch::default()).unwrap();

        assert_eq!(surface.ops_applied(), 0);
        assert_eq!(surface.patches_applied(), 1);
        assert!(surface.root().is_none());
    }

    #[test]
    fn test_replace_root_and_navigate() {
        let mut surface = MemorySurface::new();
        let tree = elem("div", vec![leaf("a"), elem("span", vec![leaf("b")])]);
        let patch = Patch {
            ops: vec![PatchOp {
                path: vec![],
                op: Op::Replace(tree),
            }],
        };
        surface.apply(&patch).unwrap();

        let root = surface.root().unwrap();
        assert_eq!(root.tag(), Some("div"));
        assert_eq!(root.node_at(&[1, 0]), Some(&leaf("b")));
        assert_eq!(root.text_content(), "ab");
        assert_eq!(surface.ops_applied(), 1);
    }
}
