//! # reflow
//!
//! Reactive component engine for Rust: batched state cells, tree-snapshot
//! diffing, scoped context channels, and a post-commit effect runner.
//!
//! ## Architecture
//!
//! The engine is single-threaded and event-driven. Component instances hold
//! state cells; external triggers batch update requests; one render pass per
//! trigger re-invokes the affected component functions and diffs their output
//! into a minimal patch for the presentation surface:
//!
//! ```text
//! dispatch(trigger) → batch resolve → render pass → diff → patch → effects
//! ```
//!
//! Key rules the whole crate is built around:
//!
//! - Updates never apply synchronously: reads inside a batch see pre-batch
//!   values, and successive function-form updates to one cell chain.
//! - When an instance re-renders, all of its descendants re-render; the diff
//!   decides what (if anything) touches the surface.
//! - Effects run strictly after the subtree's patch has been applied, in
//!   declaration order per instance.
//!
//! ## Modules
//!
//! - [`types`] - Dynamic [`Value`] and shape tags
//! - [`tree`] - Snapshot nodes produced by renders
//! - [`component`] - Component definitions and parameter records
//! - [`state`] - State cells, handles, update requests
//! - [`scheduler`] - Batching, phases, the flush loop
//! - [`reconcile`] - Diff and patch
//! - [`context`] - Ancestry-scoped context channels
//! - [`effects`] - Post-commit effect runner
//! - [`runtime`] - Instance arena, render passes, mount
//! - [`surface`] - Presentation surface trait and in-memory surface

pub mod component;
pub mod config;
pub mod context;
pub mod effects;
pub mod error;
pub mod reconcile;
pub mod runtime;
pub mod scheduler;
pub mod state;
pub mod surface;
pub mod tree;
pub mod types;

// Re-export commonly used items
pub use component::{ComponentDef, ParamSpec, RenderFn};
pub use config::{configure, reset_config, EngineConfig};
pub use context::{channel, consume, provide, reset_channels, Channel};
pub use effects::Deps;
pub use error::EngineError;
pub use reconcile::{diff, Op, Patch, PatchOp};
pub use runtime::{
    is_live, live_count, mount, mounted_root, reset_instances, reset_runtime, unmount,
    InstanceId, MountHandle, RenderCtx,
};
pub use scheduler::{dispatch, reset_scheduler};
pub use state::{apply, read, request_update, set, CellHandle, UpdateRequest};
pub use surface::{MemorySurface, Surface, SurfaceNode};
pub use tree::Node;
pub use types::{Value, ValueKind};

/// Reset every piece of engine state (for testing). Equivalent to a fresh
/// thread: instances, scheduler queue, runtime, channels, configuration.
pub fn reset_engine() {
    reset_runtime();
    reset_instances();
    reset_scheduler();
    reset_channels();
    reset_config();
}
