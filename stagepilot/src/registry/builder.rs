//! Validating registry builder.

use super::StageRegistry;
use crate::core::{CompletionKind, StageDefinition, StageKey};
use crate::errors::ValidationError;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Builder for [`StageRegistry`].
#[derive(Debug, Clone)]
pub struct StageRegistryBuilder<S: StageKey> {
    name: String,
    stages: Vec<StageDefinition<S>>,
}

impl<S: StageKey> StageRegistryBuilder<S> {
    /// Creates a new builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Adds a stage definition.
    #[must_use]
    pub fn stage(mut self, definition: StageDefinition<S>) -> Self {
        self.stages.push(definition);
        self
    }

    /// Adds several stage definitions.
    #[must_use]
    pub fn stages(mut self, definitions: impl IntoIterator<Item = StageDefinition<S>>) -> Self {
        self.stages.extend(definitions);
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates the definitions and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the registry is empty, ids or
    /// orders repeat, a successor does not point forward, a branch stage has
    /// no outcomes, or a generation stage lacks its artifact key or job.
    pub fn build(self) -> Result<StageRegistry<S>, ValidationError> {
        if self.stages.is_empty() {
            return Err(ValidationError::new(
                "EMPTY_REGISTRY",
                format!("Pipeline '{}' has no stages", self.name),
            ));
        }

        let mut stages = self.stages;
        stages.sort_by_key(|def| def.order);

        let mut orders: HashMap<S, i32> = HashMap::with_capacity(stages.len());
        let mut seen_orders = HashSet::with_capacity(stages.len());
        for def in &stages {
            if orders.insert(def.id, def.order).is_some() {
                return Err(ValidationError::new(
                    "DUPLICATE_STAGE",
                    format!("Stage '{}' is defined more than once", def.id),
                )
                .with_stages(vec![def.id.to_string()]));
            }
            if !seen_orders.insert(def.order) {
                return Err(ValidationError::new(
                    "DUPLICATE_ORDER",
                    format!("Stage '{}' reuses order {}", def.id, def.order),
                )
                .with_stages(vec![def.id.to_string()]));
            }
        }

        let forward = |from: &StageDefinition<S>, to: S| -> bool {
            orders.get(&to).is_some_and(|&order| order > from.order)
        };

        for def in &stages {
            if let Some(next) = def.next_stage {
                if !forward(def, next) {
                    return Err(ValidationError::new(
                        "INVALID_NEXT",
                        format!("Stage '{}' must continue to a later registered stage, not '{next}'", def.id),
                    )
                    .with_stages(vec![def.id.to_string(), next.to_string()]));
                }
            }

            match (&def.branch, def.completion_kind) {
                (None, CompletionKind::DecisionBranch) => {
                    return Err(ValidationError::new(
                        "MISSING_BRANCH",
                        format!("Decision stage '{}' declares no outcomes", def.id),
                    )
                    .with_stages(vec![def.id.to_string()]));
                }
                (Some(branch), CompletionKind::DecisionBranch) => {
                    if branch.outcomes.is_empty() {
                        return Err(ValidationError::new(
                            "MISSING_BRANCH",
                            format!("Decision stage '{}' declares no outcomes", def.id),
                        )
                        .with_stages(vec![def.id.to_string()]));
                    }
                    let mut names = HashSet::new();
                    for outcome in &branch.outcomes {
                        if !names.insert(outcome.name.as_str()) {
                            return Err(ValidationError::new(
                                "DUPLICATE_OUTCOME",
                                format!("Stage '{}' repeats outcome '{}'", def.id, outcome.name),
                            )
                            .with_stages(vec![def.id.to_string()]));
                        }
                        if let Some(next) = outcome.next {
                            if !forward(def, next) {
                                return Err(ValidationError::new(
                                    "INVALID_OUTCOME_NEXT",
                                    format!(
                                        "Outcome '{}' of '{}' must continue to a later registered stage",
                                        outcome.name, def.id
                                    ),
                                )
                                .with_stages(vec![def.id.to_string(), next.to_string()]));
                            }
                        }
                    }
                }
                (Some(_), _) => {
                    return Err(ValidationError::new(
                        "UNEXPECTED_BRANCH",
                        format!("Stage '{}' is not a decision stage but declares outcomes", def.id),
                    )
                    .with_stages(vec![def.id.to_string()]));
                }
                (None, _) => {}
            }

            if def.requires_generation() {
                if def.artifact_key.is_none() {
                    return Err(ValidationError::new(
                        "MISSING_ARTIFACT",
                        format!("Generation stage '{}' has no artifact key", def.id),
                    )
                    .with_stages(vec![def.id.to_string()]));
                }
                if def.job_name.is_none() {
                    return Err(ValidationError::new(
                        "MISSING_JOB",
                        format!("Generation stage '{}' has no job name", def.id),
                    )
                    .with_stages(vec![def.id.to_string()]));
                }
            }
        }

        debug!(pipeline = %self.name, stages = stages.len(), "Stage registry built");
        Ok(StageRegistry::from_sorted(self.name, stages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutcomeSpec;

    crate::stage_keys! {
        enum Step {
            A => "a",
            B => "b",
            C => "c",
        }
    }

    fn code_of(builder: StageRegistryBuilder<Step>) -> &'static str {
        builder.build().unwrap_err().code
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert_eq!(code_of(StageRegistryBuilder::new("empty")), "EMPTY_REGISTRY");
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let builder = StageRegistryBuilder::new("dup")
            .stage(StageDefinition::confirmation(Step::A, 1))
            .stage(StageDefinition::confirmation(Step::A, 2));
        assert_eq!(code_of(builder), "DUPLICATE_STAGE");
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let builder = StageRegistryBuilder::new("dup")
            .stage(StageDefinition::confirmation(Step::A, 1))
            .stage(StageDefinition::confirmation(Step::B, 1));
        assert_eq!(code_of(builder), "DUPLICATE_ORDER");
    }

    #[test]
    fn test_backward_next_rejected() {
        let builder = StageRegistryBuilder::new("loop")
            .stage(StageDefinition::confirmation(Step::A, 1))
            .stage(StageDefinition::confirmation(Step::B, 2).with_next(Step::A));
        assert_eq!(code_of(builder), "INVALID_NEXT");
    }

    #[test]
    fn test_unregistered_next_rejected() {
        let builder = StageRegistryBuilder::new("dangling")
            .stage(StageDefinition::confirmation(Step::A, 1).with_next(Step::C));
        assert_eq!(code_of(builder), "INVALID_NEXT");
    }

    #[test]
    fn test_decision_without_outcomes_rejected() {
        let builder = StageRegistryBuilder::new("branchless")
            .stage(StageDefinition::new(Step::A, 1, CompletionKind::DecisionBranch));
        assert_eq!(code_of(builder), "MISSING_BRANCH");

        let builder = StageRegistryBuilder::new("branchless")
            .stage(StageDefinition::decision(Step::A, 1, vec![]));
        assert_eq!(code_of(builder), "MISSING_BRANCH");
    }

    #[test]
    fn test_outcomes_on_plain_stage_rejected() {
        let mut def = StageDefinition::confirmation(Step::A, 1);
        def.branch = Some(crate::core::BranchSpec::new(vec![OutcomeSpec::proceed("go")]));
        assert_eq!(code_of(StageRegistryBuilder::new("x").stage(def)), "UNEXPECTED_BRANCH");
    }

    #[test]
    fn test_outcome_validation() {
        let builder = StageRegistryBuilder::new("outcomes").stage(StageDefinition::decision(
            Step::A,
            1,
            vec![OutcomeSpec::proceed("go"), OutcomeSpec::proceed("go")],
        ));
        assert_eq!(code_of(builder), "DUPLICATE_OUTCOME");

        let builder = StageRegistryBuilder::new("outcomes")
            .stage(StageDefinition::confirmation(Step::B, 0))
            .stage(StageDefinition::decision(
                Step::A,
                1,
                vec![OutcomeSpec::proceed("back").jump_to(Step::B)],
            ));
        assert_eq!(code_of(builder), "INVALID_OUTCOME_NEXT");
    }

    #[test]
    fn test_generation_requirements() {
        let builder = StageRegistryBuilder::new("gen")
            .stage(StageDefinition::new(Step::A, 1, CompletionKind::AutomatedGeneration).with_job("j"));
        assert_eq!(code_of(builder), "MISSING_ARTIFACT");

        let builder = StageRegistryBuilder::new("gen")
            .stage(StageDefinition::new(Step::A, 1, CompletionKind::Composite).with_artifact("doc"));
        assert_eq!(code_of(builder), "MISSING_JOB");
    }

    #[test]
    fn test_valid_registry_builds() {
        let registry = StageRegistryBuilder::new("ok")
            .stages([
                StageDefinition::file_upload(Step::A, 10, "upload"),
                StageDefinition::decision(
                    Step::B,
                    20,
                    vec![OutcomeSpec::proceed("approve"), OutcomeSpec::terminate("reject", "rejected")],
                ),
                StageDefinition::composite(Step::C, 30, "doc", "generate-doc"),
            ])
            .build()
            .unwrap();

        assert_eq!(registry.len(), 3);
    }
}
