//! Reconciler - snapshot diffing and patch application.
//!
//! The diff walks two expanded trees by position. A node whose type changed
//! is replaced wholesale; a node whose type matches gets its attributes
//! diffed field by field and its children diffed recursively. Nodes with no
//! difference contribute nothing, so a render pass whose output is identical
//! to the last one produces an empty patch and the surface is untouched.

mod diff;
mod patch;

pub use diff::diff;
pub use patch::{apply_to, Op, Patch, PatchOp};
