//! State store - per-instance mutable cells.
//!
//! Cells are declared positionally during render with
//! [`RenderCtx::cell`](crate::runtime::RenderCtx::cell) and addressed through
//! copyable [`CellHandle`]s afterwards. Two rules hold everywhere:
//!
//! - A cell's value only changes through an update request, and requests are
//!   queued, never applied inside the triggering call. Reading a cell while
//!   a batch is still collecting returns the pre-batch value.
//! - Handles outlive their instance. Operating on a destroyed instance's
//!   cell reports [`EngineError::InvalidHandle`]; async completions are
//!   expected to drop that error (documented choice: an error, not a silent
//!   no-op, so callers that should never race the unmount can still assert).

use std::rc::Rc;

use crate::error::EngineError;
use crate::runtime::registry;
use crate::runtime::InstanceId;
use crate::scheduler;
use crate::types::Value;

// =============================================================================
// Handles and requests
// =============================================================================

/// Stable address of one state cell: owning instance plus declaration slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellHandle {
    pub(crate) instance: InstanceId,
    pub(crate) slot: usize,
}

impl CellHandle {
    /// The instance that owns this cell.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// False once the owning instance has been unmounted.
    pub fn is_live(&self) -> bool {
        registry::is_live(self.instance)
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }
}

/// A queued state mutation.
pub enum UpdateRequest {
    /// Replace with a literal value.
    Set(Value),
    /// Pure function of the previous value. Successive `Apply`s to the same
    /// cell within one batch chain; reads of *other* cells inside the
    /// function observe their pre-batch values.
    Apply(Box<dyn FnOnce(&Value) -> Value>),
}

// =============================================================================
// StateCell
// =============================================================================

pub(crate) type Comparator = Rc<dyn Fn(&Value, &Value) -> bool>;

/// One unit of mutable state owned by exactly one instance.
pub(crate) struct StateCell {
    pub value: Value,
    pub comparator: Option<Comparator>,
}

impl StateCell {
    pub(crate) fn new(value: Value, comparator: Option<Comparator>) -> Self {
        Self { value, comparator }
    }

    /// Equality under this cell's comparator (default: structural equality).
    pub(crate) fn equals(&self, other: &Value) -> bool {
        match &self.comparator {
            Some(cmp) => cmp(&self.value, other),
            None => self.value == *other,
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Read the committed value of a cell.
pub fn read(handle: &CellHandle) -> Result<Value, EngineError> {
    registry::with(handle.instance, |instance| {
        instance.cells.get(handle.slot).map(|cell| cell.value.clone())
    })?
    .ok_or_else(|| handle.instance.stale_error())
}

/// Queue an update against the open batch. Outside any batch this forms its
/// own external trigger and flushes immediately. Calling it from inside a
/// render pass is a fatal [`EngineError::ReentrantUpdate`].
pub fn request_update(handle: &CellHandle, request: UpdateRequest) -> Result<(), EngineError> {
    scheduler::enqueue_update(*handle, request)
}

/// Queue a literal replacement.
pub fn set(handle: &CellHandle, value: impl Into<Value>) -> Result<(), EngineError> {
    request_update(handle, UpdateRequest::Set(value.into()))
}

/// Queue a function-of-previous-value update.
pub fn apply(
    handle: &CellHandle,
    f: impl FnOnce(&Value) -> Value + 'static,
) -> Result<(), EngineError> {
    request_update(handle, UpdateRequest::Apply(Box::new(f)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_comparator_is_structural() {
        let cell = StateCell::new(Value::Int(1), None);
        assert!(cell.equals(&Value::Int(1)));
        assert!(!cell.equals(&Value::Int(2)));
        assert!(!cell.equals(&Value::from("1")));
    }

    #[test]
    fn test_custom_comparator() {
        // Compare ints modulo 10.
        let cmp: Comparator =
            Rc::new(|a, b| a.as_int().map(|n| n % 10) == b.as_int().map(|n| n % 10));
        let cell = StateCell::new(Value::Int(12), Some(cmp));
        assert!(cell.equals(&Value::Int(42)));
        assert!(!cell.equals(&Value::Int(43)));
    }
}
