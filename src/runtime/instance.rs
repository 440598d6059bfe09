//! Component instances and the render-time hook surface.

use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::warn;

use crate::component::ComponentDef;
use crate::context::{self, Channel};
use crate::effects::{Deps, EffectDecl, EffectSlot};
use crate::error::EngineError;
use crate::state::{self, CellHandle, Comparator, StateCell};
use crate::tree::Node;
use crate::types::Value;

use super::registry::{self, InstanceId};

bitflags! {
    /// Why an instance is scheduled into a render pass.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct DirtyReason: u8 {
        /// A batch resolved update requests against its cells.
        const CELLS = 1;
        /// A context value it provides was replaced.
        const CONTEXT = 1 << 1;
        /// Initial mount.
        const MOUNT = 1 << 2;
    }
}

/// A child instance keyed by the position of its placeholder inside the
/// parent's snapshot.
#[derive(Clone)]
pub(crate) struct ChildSlot {
    pub pos: Vec<usize>,
    pub id: InstanceId,
}

/// One mounted occurrence of a component definition.
///
/// Owns its state cells and effect slots; they are discarded on release,
/// never carried over to a later mount of the same definition.
pub(crate) struct Instance {
    pub def: Rc<ComponentDef>,
    pub props: Value,
    pub parent: Option<InstanceId>,
    pub children: Vec<ChildSlot>,
    pub cells: Vec<StateCell>,
    pub effects: Vec<EffectSlot>,
    /// Last committed snapshot, with component placeholders intact.
    pub snapshot: Option<Node>,
    /// Context values this instance provides to its subtree (channel id -> value).
    pub provided: HashMap<usize, Value>,
    /// Absolute surface path of this instance's rendered root.
    pub anchor: Vec<usize>,
    /// Render invocations, for logging and hook-order diagnostics.
    pub renders: u64,
}

impl Instance {
    pub(crate) fn new(def: Rc<ComponentDef>, props: Value, parent: Option<InstanceId>) -> Self {
        Self {
            def,
            props,
            parent,
            children: Vec::new(),
            cells: Vec::new(),
            effects: Vec::new(),
            snapshot: None,
            provided: HashMap::new(),
            anchor: Vec::new(),
            renders: 0,
        }
    }
}

// =============================================================================
// RenderCtx
// =============================================================================

/// Hook surface handed to a component's render function.
///
/// Render functions must stay pure apart from what this context offers:
/// declaring cells and effects, reading cells and context, providing
/// context. Cell declarations are positional, so the declaration order must
/// be the same on every render of one instance.
pub struct RenderCtx {
    id: InstanceId,
    props: Value,
    cell_cursor: usize,
    effect_decls: Vec<EffectDecl>,
}

impl RenderCtx {
    pub(crate) fn new(id: InstanceId, props: Value) -> Self {
        Self {
            id,
            props,
            cell_cursor: 0,
            effect_decls: Vec::new(),
        }
    }

    /// The instance being rendered.
    pub fn instance(&self) -> InstanceId {
        self.id
    }

    /// The props this render was invoked with.
    pub fn props(&self) -> &Value {
        &self.props
    }

    /// One prop field, `Null` when absent.
    pub fn prop(&self, name: &str) -> Value {
        self.props.field(name).cloned().unwrap_or(Value::Null)
    }

    /// Declare a state cell with structural equality as its comparator.
    ///
    /// First render creates the cell at its initial value; later renders
    /// return the existing handle and ignore `initial`.
    pub fn cell(&mut self, initial: impl Into<Value>) -> CellHandle {
        self.cell_inner(initial.into(), None)
    }

    /// Declare a state cell with a custom equality comparator.
    pub fn cell_with(
        &mut self,
        initial: impl Into<Value>,
        comparator: impl Fn(&Value, &Value) -> bool + 'static,
    ) -> CellHandle {
        self.cell_inner(initial.into(), Some(Rc::new(comparator)))
    }

    fn cell_inner(&mut self, initial: Value, comparator: Option<Comparator>) -> CellHandle {
        let slot = self.cell_cursor;
        self.cell_cursor += 1;
        let _ = registry::with_mut(self.id, |instance| {
            if slot >= instance.cells.len() {
                if instance.renders > 1 {
                    // Declaration count grew after mount: declaration order
                    // is not stable for this component.
                    warn!(
                        component = instance.def.name(),
                        slot, "cell declared after first render"
                    );
                }
                instance.cells.push(StateCell::new(initial, comparator));
            }
        });
        CellHandle {
            instance: self.id,
            slot,
        }
    }

    /// Read a cell's committed value.
    pub fn read(&self, handle: &CellHandle) -> Result<Value, EngineError> {
        state::read(handle)
    }

    /// Declare a post-commit effect. `Tracked` dep values are the ones
    /// captured here, at render time.
    pub fn effect(&mut self, deps: Deps, callback: impl Fn() + 'static) {
        self.effect_decls.push(EffectDecl {
            callback: Rc::new(callback),
            deps,
        });
    }

    /// Read the nearest ancestor-provided value on `channel`, or its default.
    pub fn consume(&self, channel: &Channel) -> Result<Value, EngineError> {
        let parent = registry::with(self.id, |instance| instance.parent)?;
        context::lookup_from(channel, parent)
    }

    /// Provide a value on `channel` for this instance's subtree.
    ///
    /// The write lands immediately so children rendered in this same pass
    /// see it. Like cell values committed by batch resolution, it is not
    /// part of the pass staging: if the pass is later abandoned, the
    /// provided value stays while the snapshot rolls back.
    pub fn provide(&mut self, channel: &Channel, value: Value) -> Result<(), EngineError> {
        context::check_kind(channel, &value)?;
        registry::with_mut(self.id, |instance| {
            instance.provided.insert(channel.id, value);
        })
    }

    pub(crate) fn take_effect_decls(&mut self) -> Vec<EffectDecl> {
        std::mem::take(&mut self.effect_decls)
    }
}
