//! Patch stack engine
//!
//! - catalog: discover and order patch files
//! - trailer: the per-commit `patch-name` descriptor
//! - applier: apply one patch, with a three-way retry
//! - tracker: recover the applied stack from the marker tag and trailers
//! - range: select the part of the catalog a run applies
//! - formatter: turn applied commits back into patch files
//! - runner: run-level orchestration

pub mod applier;
pub mod catalog;
pub mod formatter;
pub mod range;
pub mod runner;
pub mod tracker;
pub mod trailer;

pub use applier::{ApplyMode, ApplyOptions, PatchApplier};
pub use catalog::{CategoryOrder, PatchCatalog, PatchEntry, PatchKind, PatchName};
pub use formatter::{FormatReport, StackFormatter};
pub use range::{clamp, resolve_bound, PatchRange};
pub use runner::{
    apply_patches, format_patches, status, validate_worktree, ApplyRequest, RunReport, RunState,
    StackStatus,
};
pub use tracker::{AppliedPatchCommit, AppliedStack, StackTracker};
