//! Instance registry - generational arena for component instances.
//!
//! Instances live in slots addressed by index; a free pool gives O(1) reuse
//! and a per-slot generation counter makes stale handles detectable after
//! reuse. All state is thread-local: the engine is single-threaded by
//! design, one logical thread runs every render pass and effect.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::component::ComponentDef;
use crate::error::EngineError;
use crate::types::Value;

use super::instance::Instance;

// =============================================================================
// Registry state
// =============================================================================

thread_local! {
    /// Instance slots. `None` marks a freed slot.
    static SLOTS: RefCell<Vec<Option<Instance>>> = const { RefCell::new(Vec::new()) };

    /// Generation per slot, bumped on release.
    static GENERATIONS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };

    /// Pool of freed indices for reuse.
    static FREE_INDICES: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Identity of one mounted component instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

impl InstanceId {
    /// Slot index, stable for the lifetime of the instance.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn stale_error(&self) -> EngineError {
        EngineError::InvalidHandle {
            index: self.index,
            generation: self.generation,
        }
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Allocate a slot for a freshly mounted instance.
pub(crate) fn allocate(
    def: Rc<ComponentDef>,
    props: Value,
    parent: Option<InstanceId>,
) -> InstanceId {
    let name = def.name().to_string();
    let instance = Instance::new(def, props, parent);

    let id = SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        let index = FREE_INDICES.with(|free| free.borrow_mut().pop());
        match index {
            Some(index) => {
                slots[index] = Some(instance);
                let generation = GENERATIONS.with(|gens| gens.borrow()[index]);
                InstanceId { index, generation }
            }
            None => {
                let index = slots.len();
                slots.push(Some(instance));
                GENERATIONS.with(|gens| gens.borrow_mut().push(0));
                InstanceId {
                    index,
                    generation: 0,
                }
            }
        }
    });

    trace!(component = %name, index = id.index, generation = id.generation, "allocate instance");
    id
}

/// Destroy an instance and its whole subtree. Cells and effects are
/// discarded with the slots; nothing is preserved for a future mount.
pub(crate) fn release(id: InstanceId) {
    if !is_live(id) {
        return;
    }

    // Children first, collected before mutating anything.
    let children: Vec<InstanceId> = SLOTS.with(|slots| {
        slots.borrow()[id.index]
            .as_ref()
            .map(|instance| instance.children.iter().map(|slot| slot.id).collect())
            .unwrap_or_default()
    });
    for child in children {
        release(child);
    }

    // Generations survive an empty tree: a handle from before an unmount
    // must stay stale across a later mount that reuses its slot.
    SLOTS.with(|slots| slots.borrow_mut()[id.index] = None);
    GENERATIONS.with(|gens| gens.borrow_mut()[id.index] += 1);
    FREE_INDICES.with(|free| free.borrow_mut().push(id.index));
    trace!(index = id.index, "release instance");
}

// =============================================================================
// Access
// =============================================================================

/// Whether the id still addresses a live instance.
pub fn is_live(id: InstanceId) -> bool {
    SLOTS.with(|slots| {
        let slots = slots.borrow();
        slots.get(id.index).is_some_and(Option::is_some)
    }) && GENERATIONS.with(|gens| gens.borrow().get(id.index) == Some(&id.generation))
}

/// Run `f` with a shared borrow of the instance.
///
/// Callers must not re-enter the registry from `f`; clone what you need out
/// and drop the borrow before calling user code.
pub(crate) fn with<R>(
    id: InstanceId,
    f: impl FnOnce(&Instance) -> R,
) -> Result<R, EngineError> {
    if !is_live(id) {
        return Err(id.stale_error());
    }
    SLOTS.with(|slots| {
        let slots = slots.borrow();
        match slots[id.index].as_ref() {
            Some(instance) => Ok(f(instance)),
            None => Err(id.stale_error()),
        }
    })
}

/// Run `f` with an exclusive borrow of the instance.
pub(crate) fn with_mut<R>(
    id: InstanceId,
    f: impl FnOnce(&mut Instance) -> R,
) -> Result<R, EngineError> {
    if !is_live(id) {
        return Err(id.stale_error());
    }
    SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        match slots[id.index].as_mut() {
            Some(instance) => Ok(f(instance)),
            None => Err(id.stale_error()),
        }
    })
}

pub(crate) fn parent_of(id: InstanceId) -> Result<Option<InstanceId>, EngineError> {
    with(id, |instance| instance.parent)
}

/// Distance from the root. Dead ids report depth 0.
pub(crate) fn depth_of(id: InstanceId) -> usize {
    let mut depth = 0;
    let mut cur = id;
    while let Ok(Some(parent)) = parent_of(cur) {
        depth += 1;
        cur = parent;
    }
    depth
}

/// Count of live instances.
pub fn live_count() -> usize {
    SLOTS.with(|slots| slots.borrow().iter().filter(|slot| slot.is_some()).count())
}

/// Reset all registry state (for testing).
pub fn reset_instances() {
    SLOTS.with(|slots| slots.borrow_mut().clear());
    GENERATIONS.with(|gens| gens.borrow_mut().clear());
    FREE_INDICES.with(|free| free.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ParamSpec;
    use crate::tree::Node;

    fn test_def(name: &str) -> Rc<ComponentDef> {
        ComponentDef::new(name, ParamSpec::new(), |_| Ok(Node::text("")))
    }

    #[test]
    fn test_allocate_and_release() {
        reset_instances();

        let a = allocate(test_def("a"), Value::Null, None);
        let b = allocate(test_def("b"), Value::Null, Some(a));

        assert!(is_live(a));
        assert!(is_live(b));
        assert_eq!(live_count(), 2);
        assert_eq!(parent_of(b).unwrap(), Some(a));

        release(b);
        assert!(!is_live(b));
        assert!(is_live(a));
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        reset_instances();

        let keeper = allocate(test_def("keeper"), Value::Null, None);
        let a = allocate(test_def("a"), Value::Null, None);
        release(a);

        // Reuses the freed slot under a newer generation.
        let b = allocate(test_def("b"), Value::Null, None);
        assert_eq!(b.index, a.index);
        assert_ne!(b.generation, a.generation);

        assert!(!is_live(a));
        assert!(is_live(b));
        assert!(matches!(
            with(a, |_| ()),
            Err(EngineError::InvalidHandle { .. })
        ));
        let _ = keeper;
    }

    #[test]
    fn test_release_is_recursive() {
        reset_instances();

        let root = allocate(test_def("root"), Value::Null, None);
        let child = allocate(test_def("child"), Value::Null, Some(root));
        let grandchild = allocate(test_def("grandchild"), Value::Null, Some(child));
        with_mut(root, |instance| {
            instance.children.push(super::super::instance::ChildSlot {
                pos: vec![0],
                id: child,
            });
        })
        .unwrap();
        with_mut(child, |instance| {
            instance.children.push(super::super::instance::ChildSlot {
                pos: vec![0],
                id: grandchild,
            });
        })
        .unwrap();

        release(root);
        assert!(!is_live(root));
        assert!(!is_live(child));
        assert!(!is_live(grandchild));
        assert_eq!(live_count(), 0);
    }

    #[test]
    fn test_depth() {
        reset_instances();

        let root = allocate(test_def("root"), Value::Null, None);
        let child = allocate(test_def("child"), Value::Null, Some(root));
        let grandchild = allocate(test_def("grandchild"), Value::Null, Some(child));

        assert_eq!(depth_of(root), 0);
        assert_eq!(depth_of(child), 1);
        assert_eq!(depth_of(grandchild), 2);
    }
}
