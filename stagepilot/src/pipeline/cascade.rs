//! Cascade skips triggered by branch decisions, and their reversal.

use super::board::{SkipRecord, StageBoard};
use crate::core::{StageKey, StageStatus};
use crate::errors::ValidationError;
use crate::registry::StageRegistry;
use std::collections::HashSet;
use tracing::debug;

/// A stage that a skip pass changed, with the status it had before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedStage<S: StageKey> {
    /// The stage.
    pub stage: S,
    /// Its status before the skip.
    pub previous: StageStatus,
}

/// Marks downstream stages not-applicable and reverses that on demand.
///
/// Skips are attributed to the branch stage that caused them. A stage that
/// is already skipped keeps its original attribution: a later branch never
/// re-evaluates it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeSkipEngine;

impl CascadeSkipEngine {
    /// Skips every stage ordered after `from` that is not in `exempt`.
    pub(crate) fn apply_skip<S: StageKey>(
        registry: &StageRegistry<S>,
        board: &mut StageBoard<S>,
        from: S,
        reason: &str,
        exempt: &HashSet<S>,
    ) -> Result<Vec<SkippedStage<S>>, ValidationError> {
        let targets: Vec<S> = registry
            .stages_after(from)?
            .iter()
            .map(|def| def.id)
            .filter(|id| !exempt.contains(id))
            .collect();
        let skipped = Self::skip_stages(board, &targets, from, reason);
        debug!(source = %from, reason, count = skipped.len(), "Cascade skip applied");
        Ok(skipped)
    }

    /// Skips exactly `stages`, attributing them to `source`.
    pub(crate) fn skip_stages<S: StageKey>(
        board: &mut StageBoard<S>,
        stages: &[S],
        source: S,
        reason: &str,
    ) -> Vec<SkippedStage<S>> {
        let mut skipped = Vec::new();
        for &stage in stages {
            let previous = board.status(stage);
            if previous == StageStatus::Skipped {
                continue;
            }
            board.skip(stage, SkipRecord::new(reason, source));
            skipped.push(SkippedStage { stage, previous });
        }
        skipped
    }

    /// Returns every stage skipped on behalf of `from` to `Pending`.
    ///
    /// Reverted stages never regain earlier progress: the skip invalidated it.
    pub(crate) fn reverse_skip<S: StageKey>(
        registry: &StageRegistry<S>,
        board: &mut StageBoard<S>,
        from: S,
    ) -> Vec<S> {
        let targets: Vec<S> = registry
            .ordered_ids()
            .filter(|&id| board.skip_record(id).is_some_and(|r| r.source == from))
            .collect();
        for &stage in &targets {
            board.set_status(stage, StageStatus::Pending);
        }
        debug!(source = %from, count = targets.len(), "Cascade skip reversed");
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OutcomeSpec, StageDefinition};

    crate::stage_keys! {
        enum Step {
            Intake => "intake",
            Gate => "gate",
            Setup => "setup",
            Notes => "notes",
            Launch => "launch",
        }
    }

    fn registry() -> StageRegistry<Step> {
        StageRegistry::builder("cascade")
            .stage(StageDefinition::confirmation(Step::Intake, 1))
            .stage(StageDefinition::decision(
                Step::Gate,
                2,
                vec![OutcomeSpec::proceed("go"), OutcomeSpec::terminate("stop", "stopped")],
            ))
            .stage(StageDefinition::confirmation(Step::Setup, 3))
            .stage(StageDefinition::confirmation(Step::Notes, 4).exempt())
            .stage(StageDefinition::confirmation(Step::Launch, 5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_apply_skip_respects_exempt_set() {
        let reg = registry();
        let mut board = StageBoard::new(reg.ordered_ids());
        let exempt = HashSet::from([Step::Notes]);

        let skipped = CascadeSkipEngine::apply_skip(&reg, &mut board, Step::Gate, "stopped", &exempt).unwrap();

        let ids: Vec<_> = skipped.iter().map(|s| s.stage).collect();
        assert_eq!(ids, vec![Step::Setup, Step::Launch]);
        assert_eq!(board.status(Step::Intake), StageStatus::Pending);
        assert_eq!(board.status(Step::Notes), StageStatus::Pending);
        assert_eq!(board.skip_record(Step::Launch).unwrap().reason, "stopped");
    }

    #[test]
    fn test_apply_skip_keeps_earlier_attribution() {
        let reg = registry();
        let mut board = StageBoard::new(reg.ordered_ids());
        board.skip(Step::Launch, SkipRecord::new("earlier", Step::Intake));

        let skipped =
            CascadeSkipEngine::apply_skip(&reg, &mut board, Step::Gate, "stopped", &HashSet::new()).unwrap();

        assert!(skipped.iter().all(|s| s.stage != Step::Launch));
        assert_eq!(board.skip_record(Step::Launch).unwrap().source, Step::Intake);
    }

    #[test]
    fn test_apply_skip_records_previous_status() {
        let reg = registry();
        let mut board = StageBoard::new(reg.ordered_ids());
        board.set_status(Step::Setup, StageStatus::Completed);

        let skipped =
            CascadeSkipEngine::apply_skip(&reg, &mut board, Step::Gate, "stopped", &HashSet::new()).unwrap();

        assert_eq!(skipped[0], SkippedStage { stage: Step::Setup, previous: StageStatus::Completed });
    }

    #[test]
    fn test_reverse_skip_returns_only_attributed_stages_to_pending() {
        let reg = registry();
        let mut board = StageBoard::new(reg.ordered_ids());
        board.set_status(Step::Setup, StageStatus::Completed);
        CascadeSkipEngine::apply_skip(&reg, &mut board, Step::Gate, "stopped", &HashSet::new()).unwrap();
        board.skip(Step::Intake, SkipRecord::new("other", Step::Notes));

        let reverted = CascadeSkipEngine::reverse_skip(&reg, &mut board, Step::Gate);

        assert_eq!(reverted, vec![Step::Setup, Step::Notes, Step::Launch]);
        assert_eq!(board.status(Step::Setup), StageStatus::Pending);
        assert_eq!(board.status(Step::Intake), StageStatus::Skipped);
    }

    #[test]
    fn test_reverse_skip_without_cascade_is_noop() {
        let reg = registry();
        let mut board = StageBoard::new(reg.ordered_ids());
        let before = board.clone();

        assert!(CascadeSkipEngine::reverse_skip(&reg, &mut board, Step::Gate).is_empty());
        assert_eq!(board, before);
    }
}
