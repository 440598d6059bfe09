//! Engine errors.
//!
//! Recovery policy:
//! - [`EngineError::InvalidHandle`] from an async completion is recoverable:
//!   the instance is gone, the caller drops the update. The scheduler itself
//!   silently discards stale triggers already sitting in a batch queue.
//! - [`EngineError::ReentrantUpdate`] is fatal for the pass: the offending
//!   update is aborted before it can recurse the scheduler.
//! - A pass that fails mid-render is abandoned wholesale: no partial patch is
//!   ever applied and the previous snapshot stays authoritative.

use thiserror::Error;

use crate::types::ValueKind;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A cell or effect handle points at a destroyed instance.
    #[error("stale handle: instance slot {index} (generation {generation}) is destroyed")]
    InvalidHandle { index: usize, generation: u64 },

    /// A state update was requested from inside an active render pass.
    #[error("state update requested during an active render pass")]
    ReentrantUpdate,

    /// A context value does not match the channel's declared contract.
    #[error("channel `{channel}`: value kind {found} does not match declared kind {expected}")]
    TypeMismatch {
        channel: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// Props do not match the component's declared parameter record.
    #[error("component `{component}`: {reason}")]
    PropShape { component: String, reason: String },

    /// Effect-driven updates kept scheduling passes without settling.
    #[error("render passes exceeded the configured limit of {limit} without settling")]
    UpdateLoop { limit: usize },

    /// A patch op named a surface node that does not exist or has the wrong shape.
    #[error("patch: {0}")]
    Patch(String),

    /// Mount or unmount called at an invalid time or on an invalid root.
    #[error("mount: {0}")]
    Mount(String),

    /// Configuration touched after the engine started.
    #[error("config: {0}")]
    Config(String),
}
