//! Structural diff between two expanded trees.
//!
//! Position plus type identity drives everything: same position, same kind,
//! same tag means diff attributes and recurse into children; anything else
//! is a wholesale replace of the subtree at that position.

use crate::surface::SurfaceNode;

use super::patch::{Op, Patch};

/// Diff `old` against `new`, producing ops addressed relative to the surface
/// root. `base` is the absolute path of `new`'s position (the instance
/// anchor); a missing `old` yields a single `Replace`.
pub fn diff(old: Option<&SurfaceNode>, new: &SurfaceNode, base: &[usize]) -> Patch {
    let mut patch = Patch::default();
    let mut path = base.to_vec();
    match old {
        Some(old) => diff_node(old, new, &mut path, &mut patch),
        None => patch.push(path, Op::Replace(new.clone())),
    }
    patch
}

fn diff_node(old: &SurfaceNode, new: &SurfaceNode, path: &mut Vec<usize>, patch: &mut Patch) {
    match (old, new) {
        (SurfaceNode::Text(old_text), SurfaceNode::Text(new_text)) => {
            if old_text != new_text {
                patch.push(path.clone(), Op::SetText(new_text.clone()));
            }
        }
        (
            SurfaceNode::Element {
                tag: old_tag,
                attrs: old_attrs,
                children: old_children,
            },
            SurfaceNode::Element {
                tag: new_tag,
                attrs: new_attrs,
                children: new_children,
            },
        ) if old_tag == new_tag => {
            // Attributes, field by field.
            for (name, value) in new_attrs {
                if old_attrs.get(name) != Some(value) {
                    patch.push(path.clone(), Op::SetAttr(name.clone(), value.clone()));
                }
            }
            for name in old_attrs.keys() {
                if !new_attrs.contains_key(name) {
                    patch.push(path.clone(), Op::RemoveAttr(name.clone()));
                }
            }

            // Children: positional recursion, then tail inserts or removes.
            let common = old_children.len().min(new_children.len());
            for index in 0..common {
                path.push(index);
                diff_node(&old_children[index], &new_children[index], path, patch);
                path.pop();
            }
            for (index, child) in new_children.iter().enumerate().skip(common) {
                patch.push(path.clone(), Op::InsertChild(index, child.clone()));
            }
            // Back to front so earlier removals do not shift later indices.
            for index in (common..old_children.len()).rev() {
                patch.push(path.clone(), Op::RemoveChild(index));
            }
        }
        // Kind or tag changed: discard the subtree.
        _ => patch.push(path.clone(), Op::Replace(new.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::apply_to;
    use crate::types::Value;
    use std::collections::BTreeMap;

    fn text(s: &str) -> SurfaceNode {
        SurfaceNode::Text(s.to_string())
    }

    fn elem(tag: &str, attrs: &[(&str, Value)], children: Vec<SurfaceNode>) -> SurfaceNode {
        SurfaceNode::Element {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            children,
        }
    }

    /// Diff then apply must reconstruct `new` exactly.
    fn check_roundtrip(old: &SurfaceNode, new: &SurfaceNode) -> Patch {
        let patch = diff(Some(old), new, &[]);
        let mut tree = Some(old.clone());
        apply_to(&mut tree, &patch).unwrap();
        assert_eq!(tree.as_ref(), Some(new));
        patch
    }

    #[test]
    fn test_identical_trees_empty_patch() {
        let tree = elem(
            "div",
            &[("id", Value::from("root"))],
            vec![text("a"), elem("span", &[], vec![])],
        );
        let patch = diff(Some(&tree), &tree, &[]);
        assert!(patch.is_empty());
    }

    #[test]
    fn test_text_change() {
        let patch = check_roundtrip(&text("1"), &text("2"));
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.ops[0].op, Op::SetText("2".to_string()));
    }

    #[test]
    fn test_attr_set_and_remove() {
        let old = elem("div", &[("a", Value::Int(1)), ("b", Value::Int(2))], vec![]);
        let new = elem("div", &[("a", Value::Int(9)), ("c", Value::Int(3))], vec![]);
        let patch = check_roundtrip(&old, &new);
        assert_eq!(patch.len(), 3); // set a, set c, remove b
    }

    #[test]
    fn test_tag_change_replaces_wholesale() {
        let old = elem("div", &[], vec![text("deep")]);
        let new = elem("section", &[], vec![text("deep")]);
        let patch = check_roundtrip(&old, &new);
        assert_eq!(patch.len(), 1);
        assert!(matches!(patch.ops[0].op, Op::Replace(_)));
    }

    #[test]
    fn test_kind_change_replaces_wholesale() {
        let patch = check_roundtrip(&text("x"), &elem("div", &[], vec![]));
        assert_eq!(patch.len(), 1);
        assert!(matches!(patch.ops[0].op, Op::Replace(_)));
    }

    #[test]
    fn test_child_appends_and_removals() {
        let old = elem("ul", &[], vec![text("a"), text("b"), text("c")]);
        let new = elem("ul", &[], vec![text("a")]);
        check_roundtrip(&old, &new);

        let grown = elem("ul", &[], vec![text("a"), text("x"), text("y")]);
        check_roundtrip(&new, &grown);
    }

    #[test]
    fn test_nested_change_has_deep_path() {
        let old = elem("div", &[], vec![elem("span", &[], vec![text("old")])]);
        let new = elem("div", &[], vec![elem("span", &[], vec![text("new")])]);
        let patch = check_roundtrip(&old, &new);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.ops[0].path, vec![0, 0]);
    }

    #[test]
    fn test_base_path_offsets_ops() {
        let patch = diff(Some(&text("a")), &text("b"), &[2, 1]);
        assert_eq!(patch.ops[0].path, vec![2, 1]);
    }

    #[test]
    fn test_missing_old_is_replace_at_base() {
        let patch = diff(None, &text("fresh"), &[0]);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.ops[0].path, vec![0]);
        assert!(matches!(patch.ops[0].op, Op::Replace(_)));
    }
}
