//! The pipeline state machine.
//!
//! This module provides:
//! - `PipelineInstance`, the per-subject status and visibility owner
//! - Branch resolution and cascade skips
//! - Transitions described as data (`Transition`, `Effect`, `PipelineCommand`)
//! - Read-only snapshots for renderers

mod board;
mod branch;
mod cascade;
mod command;
mod derive;
mod effects;
mod instance;
mod snapshot;

pub use board::SkipRecord;
pub use branch::{BranchResolution, BranchRoute, DecisionBranchResolver};
pub use cascade::{CascadeSkipEngine, SkippedStage};
pub use command::{reduce, PipelineCommand};
pub use derive::{current_stage, is_complete};
pub use effects::{Effect, StoreWrite, Transition};
pub use instance::{BranchDecision, Hydration, PipelineInstance, TerminalReason};
pub use snapshot::PipelineSnapshot;
