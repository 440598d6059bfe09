//! Tree snapshots - the immutable output of a render.
//!
//! A component render produces a [`Node`] tree: plain elements and text,
//! plus [`Node::Component`] placeholders that the runtime expands into child
//! instances. Snapshots are data only; they exist to be diffed against the
//! previous snapshot and are superseded on every render pass.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::warn;

use crate::component::ComponentDef;
use crate::types::Value;

/// One node of a tree snapshot.
#[derive(Clone, Debug)]
pub enum Node {
    /// Host element: a tag, attributes, ordered children.
    Element {
        tag: String,
        attrs: BTreeMap<String, Value>,
        children: Vec<Node>,
    },
    /// Text leaf.
    Text(String),
    /// Placeholder for a nested component instance. The runtime mounts or
    /// updates the instance and splices its rendered subtree in here.
    Component { def: Rc<ComponentDef>, props: Value },
}

impl Node {
    /// Start an element node. Chain [`Node::attr`] and [`Node::child`].
    pub fn element(tag: impl Into<String>) -> Node {
        Node::Element {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Text leaf node.
    pub fn text(content: impl Into<String>) -> Node {
        Node::Text(content.into())
    }

    /// Component placeholder node.
    pub fn component(def: &Rc<ComponentDef>, props: Value) -> Node {
        Node::Component {
            def: def.clone(),
            props,
        }
    }

    /// Set an attribute. No-op (with a warning) on non-element nodes.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        match &mut self {
            Node::Element { attrs, .. } => {
                attrs.insert(name.into(), value.into());
            }
            _ => warn!("attr() on a non-element node is ignored"),
        }
        self
    }

    /// Append a child node. No-op (with a warning) on non-element nodes.
    pub fn child(mut self, node: Node) -> Self {
        match &mut self {
            Node::Element { children, .. } => children.push(node),
            _ => warn!("child() on a non-element node is ignored"),
        }
        self
    }

    /// Append several children.
    pub fn children(self, nodes: impl IntoIterator<Item = Node>) -> Self {
        nodes.into_iter().fold(self, Node::child)
    }

    /// Element tag, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }
}
