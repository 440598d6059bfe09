//! Context channels - ancestry-scoped value propagation.
//!
//! A channel carries one value from a providing instance to every descendant
//! that consumes it, with no prop threading in between. Lookup walks the
//! ownership ancestry and the nearest provider wins; with no provider the
//! channel's registered default applies.
//!
//! The declared contract is the kind of the default value: providing a value
//! of another kind reports [`EngineError::TypeMismatch`] at the provide call
//! site. A channel whose default is `Null` is untyped and accepts anything.

use std::cell::RefCell;

use tracing::trace;

use crate::error::EngineError;
use crate::runtime::registry;
use crate::runtime::InstanceId;
use crate::scheduler;
use crate::types::{Value, ValueKind};

/// Handle to a registered context channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Channel {
    pub(crate) id: usize,
}

struct ChannelInfo {
    name: String,
    default: Value,
    kind: ValueKind,
}

thread_local! {
    static CHANNELS: RefCell<Vec<ChannelInfo>> = const { RefCell::new(Vec::new()) };
}

// =============================================================================
// Registration
// =============================================================================

/// Register a channel. The default's kind becomes the channel contract.
pub fn channel(name: &str, default: Value) -> Channel {
    CHANNELS.with(|channels| {
        let mut channels = channels.borrow_mut();
        let id = channels.len();
        trace!(name, id, "register channel");
        channels.push(ChannelInfo {
            name: name.to_string(),
            kind: default.kind(),
            default,
        });
        Channel { id }
    })
}

/// Clear all registered channels (for testing).
pub fn reset_channels() {
    CHANNELS.with(|channels| channels.borrow_mut().clear());
}

pub(crate) fn name_of(channel: &Channel) -> String {
    CHANNELS.with(|channels| {
        channels
            .borrow()
            .get(channel.id)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| format!("#{}", channel.id))
    })
}

pub(crate) fn default_of(channel: &Channel) -> Value {
    CHANNELS.with(|channels| {
        channels
            .borrow()
            .get(channel.id)
            .map(|info| info.default.clone())
            .unwrap_or(Value::Null)
    })
}

/// Enforce the channel contract on a value.
pub(crate) fn check_kind(channel: &Channel, value: &Value) -> Result<(), EngineError> {
    let expected = CHANNELS.with(|channels| {
        channels
            .borrow()
            .get(channel.id)
            .map(|info| info.kind)
            .unwrap_or(ValueKind::Null)
    });
    // Null-kinded channels are untyped.
    if expected != ValueKind::Null && value.kind() != expected {
        return Err(EngineError::TypeMismatch {
            channel: name_of(channel),
            expected,
            found: value.kind(),
        });
    }
    Ok(())
}

// =============================================================================
// Provide / consume
// =============================================================================

/// Provide a value for every descendant of `target`, as an external trigger.
///
/// An equal replacement value schedules nothing; a differing value re-renders
/// the provider's subtree under the normal batching rules. Components can
/// also provide during their own render via
/// [`RenderCtx::provide`](crate::runtime::RenderCtx::provide).
pub fn provide(channel: &Channel, value: Value, target: InstanceId) -> Result<(), EngineError> {
    check_kind(channel, &value)?;
    scheduler::enqueue_provide(target, *channel, value)
}

/// Read the value `instance` sees on `channel`: nearest ancestor provider,
/// or the channel default. The instance's own provided value is scoped to
/// its descendants, not to itself.
pub fn consume(channel: &Channel, instance: InstanceId) -> Result<Value, EngineError> {
    let parent = registry::with(instance, |inner| inner.parent)?;
    lookup_from(channel, parent)
}

/// Walk ancestry starting at `from` (inclusive), nearest provider wins.
pub(crate) fn lookup_from(
    channel: &Channel,
    mut from: Option<InstanceId>,
) -> Result<Value, EngineError> {
    while let Some(id) = from {
        let (provided, parent) = registry::with(id, |instance| {
            (instance.provided.get(&channel.id).cloned(), instance.parent)
        })?;
        if let Some(value) = provided {
            check_kind(channel, &value)?;
            return Ok(value);
        }
        from = parent;
    }
    Ok(default_of(channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_contract() {
        reset_channels();

        let numbers = channel("numbers", Value::Int(0));
        check_kind(&numbers, &Value::Int(7)).unwrap();
        let err = check_kind(&numbers, &Value::from("seven")).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }

    #[test]
    fn test_null_default_is_untyped() {
        reset_channels();

        let anything = channel("anything", Value::Null);
        check_kind(&anything, &Value::Int(1)).unwrap();
        check_kind(&anything, &Value::from("s")).unwrap();
    }

    #[test]
    fn test_default_of() {
        reset_channels();

        let shared = channel("shared", Value::record([("v", Value::Int(11111))]));
        assert_eq!(
            default_of(&shared),
            Value::record([("v", Value::Int(11111))])
        );
    }
}
