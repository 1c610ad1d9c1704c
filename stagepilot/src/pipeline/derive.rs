//! Current-stage derivation.
//!
//! The current stage is never stored: it is recomputed from the status map
//! on demand, so every caller sees the same answer.

use crate::core::{StageKey, StageStatus};
use crate::registry::StageRegistry;
use std::collections::HashMap;

/// Returns the first stage, by order, whose status is still open.
#[must_use]
pub fn current_stage<S: StageKey>(
    registry: &StageRegistry<S>,
    statuses: &HashMap<S, StageStatus>,
) -> Option<S> {
    registry
        .ordered_ids()
        .find(|id| statuses.get(id).copied().unwrap_or_default().is_open())
}

/// Returns true if no stage is open and the pipeline was not terminated.
#[must_use]
pub fn is_complete<S: StageKey>(
    registry: &StageRegistry<S>,
    statuses: &HashMap<S, StageStatus>,
    terminated: bool,
) -> bool {
    !terminated && current_stage(registry, statuses).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageDefinition;

    crate::stage_keys! {
        enum Step {
            A => "a",
            B => "b",
            C => "c",
        }
    }

    fn registry() -> StageRegistry<Step> {
        StageRegistry::builder("derive")
            .stage(StageDefinition::confirmation(Step::A, 1))
            .stage(StageDefinition::confirmation(Step::B, 5))
            .stage(StageDefinition::confirmation(Step::C, 9))
            .build()
            .unwrap()
    }

    #[test]
    fn test_first_open_stage_is_current() {
        let statuses = HashMap::from([
            (Step::A, StageStatus::Completed),
            (Step::B, StageStatus::Skipped),
            (Step::C, StageStatus::ActionRequired),
        ]);
        assert_eq!(current_stage(&registry(), &statuses), Some(Step::C));
    }

    #[test]
    fn test_missing_entries_count_as_pending() {
        let statuses = HashMap::from([(Step::A, StageStatus::Completed)]);
        assert_eq!(current_stage(&registry(), &statuses), Some(Step::B));
    }

    #[test]
    fn test_failed_stage_stays_current() {
        let statuses = HashMap::from([
            (Step::A, StageStatus::Failed),
            (Step::B, StageStatus::Pending),
        ]);
        assert_eq!(current_stage(&registry(), &statuses), Some(Step::A));
    }

    #[test]
    fn test_complete_only_without_terminal() {
        let statuses = HashMap::from([
            (Step::A, StageStatus::Completed),
            (Step::B, StageStatus::Completed),
            (Step::C, StageStatus::Skipped),
        ]);
        assert_eq!(current_stage(&registry(), &statuses), None);
        assert!(is_complete(&registry(), &statuses, false));
        assert!(!is_complete(&registry(), &statuses, true));
    }
}
