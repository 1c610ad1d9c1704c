//! Testing utilities for stagepilot pipelines.
//!
//! This module provides:
//! - Reference registries (`ReviewFlow`, `ContractFlow`)
//! - Scripted collaborators (artifact lookup, job trigger, store, listener)
//! - Snapshot assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_collapsed, assert_current, assert_expanded, assert_skipped_with, assert_stage_status,
};
pub use fixtures::{contract_registry, review_registry, ContractFlow, ReviewFlow, REJECTED};
pub use mocks::{
    FailingStageDataStore, RecordingCompletionListener, RecordingJobTrigger, ScriptedArtifactLookup,
};
