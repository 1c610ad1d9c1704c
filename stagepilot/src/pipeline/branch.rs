//! Evaluation of decisions made at branch stages.

use crate::core::{OutcomeSpec, StageKey};
use crate::errors::{InvalidTransitionError, PipelineError, ValidationError};
use crate::registry::StageRegistry;

/// Where the pipeline goes after a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchRoute<S: StageKey> {
    /// Cascade-skip everything downstream with `reason`.
    Terminate {
        /// Reason recorded on skipped stages and as the terminal reason.
        reason: String,
    },
    /// Continue to `next`, skipping `bypassed` stages on the way.
    Continue {
        /// The stage the decision leads to, if any.
        next: Option<S>,
        /// Stages strictly between the branch and `next`.
        bypassed: Vec<S>,
    },
}

/// A validated decision, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResolution<S: StageKey> {
    /// The branch stage.
    pub stage: S,
    /// The chosen outcome.
    pub outcome: OutcomeSpec<S>,
    /// The path taken.
    pub route: BranchRoute<S>,
}

impl<S: StageKey> BranchResolution<S> {
    /// Returns true if the decision ends the pipeline.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        matches!(self.route, BranchRoute::Terminate { .. })
    }

    /// The stage expanded after the decision.
    #[must_use]
    pub fn next(&self) -> Option<S> {
        match &self.route {
            BranchRoute::Terminate { .. } => None,
            BranchRoute::Continue { next, .. } => *next,
        }
    }
}

/// Decides which downstream path a branch outcome takes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionBranchResolver;

impl DecisionBranchResolver {
    /// Resolves `outcome` at `stage`.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if `stage` is not a decision stage; `Validation`
    /// if the stage or outcome is unknown.
    pub fn resolve<S: StageKey>(
        registry: &StageRegistry<S>,
        stage: S,
        outcome: &str,
    ) -> Result<BranchResolution<S>, PipelineError> {
        let def = registry.definition_of(stage)?;
        let branch = match (&def.branch, def.is_branch()) {
            (Some(branch), true) => branch,
            _ => {
                return Err(InvalidTransitionError::new(
                    stage.as_str(),
                    "resolve_branch",
                    format!("stage is a {} stage, not a decision", def.completion_kind),
                )
                .into())
            }
        };
        let spec = branch
            .outcome(outcome)
            .ok_or_else(|| ValidationError::unknown_outcome(stage.as_str(), outcome))?
            .clone();

        let route = if spec.terminating {
            BranchRoute::Terminate {
                reason: spec.reason(),
            }
        } else {
            let next = match spec.next.or(def.next_stage) {
                Some(next) => Some(next),
                None => registry.successor_of(stage)?,
            };
            let bypassed = match next {
                Some(next) => registry
                    .stages_between(stage, next)?
                    .iter()
                    .filter(|d| !d.exempt_from_cascade_skip)
                    .map(|d| d.id)
                    .collect(),
                None => Vec::new(),
            };
            BranchRoute::Continue { next, bypassed }
        };

        Ok(BranchResolution {
            stage,
            outcome: spec,
            route,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageDefinition;

    crate::stage_keys! {
        enum Step {
            Source => "source",
            Format => "format",
            LongForm => "long_form",
            Social => "social",
            Publish => "publish",
        }
    }

    fn registry() -> StageRegistry<Step> {
        StageRegistry::builder("repurpose")
            .stage(StageDefinition::file_upload(Step::Source, 10, "source"))
            .stage(StageDefinition::decision(
                Step::Format,
                20,
                vec![
                    OutcomeSpec::proceed("full_pack"),
                    OutcomeSpec::proceed("social_only").jump_to(Step::Social),
                    OutcomeSpec::terminate("cancel", "Repurpose cancelled"),
                ],
            ))
            .stage(StageDefinition::generated(Step::LongForm, 30, "long_form", "gen-long"))
            .stage(StageDefinition::generated(Step::Social, 40, "social", "gen-social"))
            .stage(StageDefinition::confirmation(Step::Publish, 50))
            .build()
            .unwrap()
    }

    #[test]
    fn test_proceed_continues_to_successor() {
        let res = DecisionBranchResolver::resolve(&registry(), Step::Format, "full_pack").unwrap();
        assert!(!res.is_terminating());
        assert_eq!(
            res.route,
            BranchRoute::Continue { next: Some(Step::LongForm), bypassed: vec![] }
        );
    }

    #[test]
    fn test_jump_bypasses_intermediate_stages() {
        let res = DecisionBranchResolver::resolve(&registry(), Step::Format, "social_only").unwrap();
        assert_eq!(res.next(), Some(Step::Social));
        assert_eq!(
            res.route,
            BranchRoute::Continue { next: Some(Step::Social), bypassed: vec![Step::LongForm] }
        );
    }

    #[test]
    fn test_terminating_outcome() {
        let res = DecisionBranchResolver::resolve(&registry(), Step::Format, "cancel").unwrap();
        assert!(res.is_terminating());
        assert_eq!(res.next(), None);
        assert_eq!(
            res.route,
            BranchRoute::Terminate { reason: "Repurpose cancelled".to_string() }
        );
    }

    #[test]
    fn test_unknown_outcome_is_validation_error() {
        let err = DecisionBranchResolver::resolve(&registry(), Step::Format, "maybe").unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_OUTCOME");
    }

    #[test]
    fn test_non_branch_stage_is_invalid_transition() {
        let err = DecisionBranchResolver::resolve(&registry(), Step::Source, "full_pack").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition(_)));
    }
}
