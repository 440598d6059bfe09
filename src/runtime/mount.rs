//! Mount API - application lifecycle.
//!
//! [`mount`] is the single external entry point: it attaches a root
//! component definition to a presentation surface, runs the initial render
//! pass, and returns a [`MountHandle`] for later unmounting. One root is
//! active at a time.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use crate::component::ComponentDef;
use crate::config;
use crate::error::EngineError;
use crate::reconcile::{Op, Patch, PatchOp};
use crate::scheduler;
use crate::surface::Surface;
use crate::types::Value;

use super::registry::{self, InstanceId};

// =============================================================================
// Mount handle
// =============================================================================

/// Handle returned by [`mount`] that allows unmounting.
#[derive(Debug)]
pub struct MountHandle {
    root: InstanceId,
}

impl MountHandle {
    /// The root instance.
    pub fn root(&self) -> InstanceId {
        self.root
    }

    /// Whether this handle's root is still the mounted root.
    pub fn is_mounted(&self) -> bool {
        super::mounted_root() == Some(self.root)
    }

    /// Detach the root from the surface and destroy the instance tree.
    ///
    /// Every cell and effect under the root is discarded; a later mount of
    /// the same definition starts from its declared initial values.
    pub fn unmount(self) -> Result<(), EngineError> {
        unmount(self)
    }
}

// =============================================================================
// Mount / unmount
// =============================================================================

/// Mount a root component onto a surface and run the initial render pass.
///
/// Freezes the engine configuration, validates the root props against the
/// definition's declared parameters, and runs mount effects once the
/// initial patch has been applied.
pub fn mount(
    def: &Rc<ComponentDef>,
    props: Value,
    surface: Rc<RefCell<dyn Surface>>,
) -> Result<MountHandle, EngineError> {
    scheduler::ensure_idle("mount")?;
    if super::mounted_root().is_some() {
        return Err(EngineError::Mount("a root is already mounted".to_string()));
    }
    def.validate_props(&props)?;

    config::freeze();
    let root = registry::allocate(def.clone(), props, None);
    super::init(root, surface);
    info!(component = def.name(), "mount");

    match scheduler::flush_mount(root) {
        Ok(()) => Ok(MountHandle { root }),
        Err(err) => {
            registry::release(root);
            super::clear();
            Err(err)
        }
    }
}

/// Unmount and clean up.
pub fn unmount(handle: MountHandle) -> Result<(), EngineError> {
    scheduler::ensure_idle("unmount")?;
    if super::mounted_root() != Some(handle.root) {
        return Err(EngineError::Mount("handle does not match the mounted root".to_string()));
    }

    let name = registry::with(handle.root, |instance| instance.def.name().to_string())?;

    let patch = Patch {
        ops: vec![PatchOp {
            path: vec![],
            op: Op::Remove,
        }],
    };
    super::apply_patch(&patch)?;

    registry::release(handle.root);
    super::clear();
    info!(component = %name, "unmount");
    Ok(())
}
