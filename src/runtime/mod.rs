//! Runtime - instances, render passes, and the mounted root.
//!
//! The runtime owns the committed picture of the world: the instance arena,
//! the mounted root, the surface handle, and the shadow tree (the engine's
//! copy of what the surface currently shows, which diffs run against).

pub mod registry;
pub(crate) mod instance;
pub(crate) mod render;
mod mount;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::EngineError;
use crate::reconcile::Patch;
use crate::surface::{Surface, SurfaceNode};

pub use instance::RenderCtx;
pub use mount::{mount, unmount, MountHandle};
pub use registry::{is_live, live_count, reset_instances, InstanceId};

// =============================================================================
// Runtime state
// =============================================================================

#[derive(Default)]
struct RuntimeState {
    root: Option<InstanceId>,
    surface: Option<Rc<RefCell<dyn Surface>>>,
    /// Committed expansion of the whole tree, kept for diffing.
    shadow: Option<SurfaceNode>,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

pub(crate) fn init(root: InstanceId, surface: Rc<RefCell<dyn Surface>>) {
    RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.root = Some(root);
        rt.surface = Some(surface);
        rt.shadow = None;
    });
}

pub(crate) fn clear() {
    RUNTIME.with(|rt| *rt.borrow_mut() = RuntimeState::default());
}

/// The currently mounted root instance, if any.
pub fn mounted_root() -> Option<InstanceId> {
    RUNTIME.with(|rt| rt.borrow().root)
}

/// Committed surface subtree at `path`.
pub(crate) fn shadow_at(path: &[usize]) -> Option<SurfaceNode> {
    RUNTIME.with(|rt| {
        rt.borrow()
            .shadow
            .as_ref()
            .and_then(|root| root.node_at(path))
            .cloned()
    })
}

/// Install a freshly committed subtree at `path`.
pub(crate) fn shadow_set(path: &[usize], node: SurfaceNode) {
    RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        if path.is_empty() {
            rt.shadow = Some(node);
        } else if let Some(root) = rt.shadow.as_mut() {
            if let Some(slot) = root.node_at_mut(path) {
                *slot = node;
            }
        }
    });
}

/// Hand a patch to the mounted surface.
pub(crate) fn apply_patch(patch: &Patch) -> Result<(), EngineError> {
    let surface = RUNTIME
        .with(|rt| rt.borrow().surface.clone())
        .ok_or_else(|| EngineError::Mount("no surface mounted".to_string()))?;
    surface.borrow_mut().apply(patch)
}

/// Reset runtime state (for testing). Does not touch the instance arena.
pub fn reset_runtime() {
    clear();
}
