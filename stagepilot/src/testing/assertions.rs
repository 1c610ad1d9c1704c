//! Assertions over pipeline snapshots.

use crate::core::{StageKey, StageStatus};
use crate::pipeline::PipelineSnapshot;

/// Asserts that `stage` has `expected` status.
pub fn assert_stage_status<S: StageKey>(snapshot: &PipelineSnapshot<S>, stage: S, expected: StageStatus) {
    let actual = snapshot.status(stage);
    assert_eq!(
        actual, expected,
        "Expected stage '{stage}' to be {expected}, got {actual}"
    );
}

/// Asserts that `stage` is skipped with `reason`.
pub fn assert_skipped_with<S: StageKey>(snapshot: &PipelineSnapshot<S>, stage: S, reason: &str) {
    assert_stage_status(snapshot, stage, StageStatus::Skipped);
    assert_eq!(
        snapshot.skip_reason(stage),
        Some(reason),
        "Unexpected skip reason for stage '{stage}'"
    );
}

/// Asserts that `stage` is expanded.
pub fn assert_expanded<S: StageKey>(snapshot: &PipelineSnapshot<S>, stage: S) {
    assert!(
        !snapshot.is_collapsed(stage),
        "Expected stage '{stage}' to be expanded"
    );
}

/// Asserts that `stage` is collapsed.
pub fn assert_collapsed<S: StageKey>(snapshot: &PipelineSnapshot<S>, stage: S) {
    assert!(
        snapshot.is_collapsed(stage),
        "Expected stage '{stage}' to be collapsed"
    );
}

/// Asserts the current stage.
pub fn assert_current<S: StageKey>(snapshot: &PipelineSnapshot<S>, expected: Option<S>) {
    assert_eq!(
        snapshot.current_stage, expected,
        "Unexpected current stage; statuses: {:?}",
        snapshot.status_map
    );
}
