//! Effect runner - post-commit callbacks.
//!
//! Effects declared during a render never run inside it. Once the whole pass
//! has committed (every rendered instance's subtree patch applied), due
//! effects run post-order: children before parents, declaration order within
//! one instance. Effects may queue state updates; those open the next pass
//! of the same flush.

use std::rc::Rc;

use tracing::trace;

use crate::runtime::registry;
use crate::runtime::InstanceId;
use crate::types::Value;

/// When an effect is due.
#[derive(Clone, Debug)]
pub enum Deps {
    /// Due after every render of the owning instance.
    EveryRender,
    /// Due exactly once, after the mount render.
    OnMount,
    /// Due on mount and whenever any listed value differs from its value at
    /// the previous due-check. Values are captured at render time.
    Tracked(Vec<Value>),
}

/// Declaration captured during one render.
pub(crate) struct EffectDecl {
    pub callback: Rc<dyn Fn()>,
    pub deps: Deps,
}

/// Persistent per-instance effect slot, matched to declarations by position.
pub(crate) struct EffectSlot {
    pub callback: Rc<dyn Fn()>,
    pub deps: Deps,
    /// Tracked values at the previous due-check.
    pub last: Option<Vec<Value>>,
    pub has_run: bool,
}

/// Fold this render's declarations into the instance's slots. Positional:
/// slot N keeps its history, only callback and current deps refresh.
pub(crate) fn commit_decls(slots: &mut Vec<EffectSlot>, decls: Vec<EffectDecl>) {
    let declared = decls.len();
    for (index, decl) in decls.into_iter().enumerate() {
        if let Some(slot) = slots.get_mut(index) {
            slot.callback = decl.callback;
            slot.deps = decl.deps;
        } else {
            slots.push(EffectSlot {
                callback: decl.callback,
                deps: decl.deps,
                last: None,
                has_run: false,
            });
        }
    }
    // A shrunk declaration list drops the tail slots.
    slots.truncate(declared);
}

/// Collect due callbacks for every instance rendered this pass, post-order
/// under each rendered root. Performs the due-check side effects (updating
/// `last` and `has_run`) as it goes.
pub(crate) fn collect_due(rendered_roots: &[InstanceId]) -> Vec<Rc<dyn Fn()>> {
    let mut due = Vec::new();
    for root in rendered_roots {
        visit(*root, &mut due);
    }
    due
}

fn visit(id: InstanceId, due: &mut Vec<Rc<dyn Fn()>>) {
    let children: Vec<InstanceId> = registry::with(id, |instance| {
        instance.children.iter().map(|slot| slot.id).collect()
    })
    .unwrap_or_default();
    for child in children {
        visit(child, due);
    }

    let _ = registry::with_mut(id, |instance| {
        for (index, slot) in instance.effects.iter_mut().enumerate() {
            let deps = slot.deps.clone();
            let is_due = match deps {
                Deps::EveryRender => true,
                Deps::OnMount => !slot.has_run,
                Deps::Tracked(now) => {
                    let differs = slot.last.as_ref() != Some(&now);
                    let first = !slot.has_run;
                    slot.last = Some(now);
                    first || differs
                }
            };
            if is_due {
                trace!(index, instance = id.index(), "effect due");
                slot.has_run = true;
                due.push(slot.callback.clone());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(deps: Deps) -> EffectDecl {
        EffectDecl {
            callback: Rc::new(|| {}),
            deps,
        }
    }

    #[test]
    fn test_commit_preserves_history_by_position() {
        let mut slots = Vec::new();
        commit_decls(&mut slots, vec![decl(Deps::Tracked(vec![Value::Int(1)]))]);
        slots[0].has_run = true;
        slots[0].last = Some(vec![Value::Int(1)]);

        commit_decls(&mut slots, vec![decl(Deps::Tracked(vec![Value::Int(2)]))]);
        assert!(slots[0].has_run);
        assert_eq!(slots[0].last, Some(vec![Value::Int(1)]));
        match &slots[0].deps {
            Deps::Tracked(now) => assert_eq!(now, &vec![Value::Int(2)]),
            _ => panic!("expected tracked deps"),
        }
    }

    #[test]
    fn test_commit_truncates_dropped_tail() {
        let mut slots = Vec::new();
        commit_decls(&mut slots, vec![decl(Deps::OnMount), decl(Deps::OnMount)]);
        assert_eq!(slots.len(), 2);

        commit_decls(&mut slots, vec![decl(Deps::OnMount)]);
        assert_eq!(slots.len(), 1);
    }
}
