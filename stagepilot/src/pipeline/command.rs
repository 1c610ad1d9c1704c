//! Transitions as data.

use super::effects::Transition;
use super::instance::PipelineInstance;
use crate::core::{CompletionEvidence, StageKey};
use crate::errors::PipelineError;

/// One request to change a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineCommand<S: StageKey> {
    /// Start the pipeline: auto-start generation for the first stage.
    Activate,
    /// Move a pending stage to in-progress.
    Begin(S),
    /// Complete a stage with evidence.
    Complete(S, CompletionEvidence),
    /// Return a stage to pending.
    Uncomplete {
        /// The stage.
        stage: S,
        /// Why it was reopened.
        reason: String,
    },
    /// Record a branch decision.
    Resolve {
        /// The decision stage.
        stage: S,
        /// Outcome name.
        outcome: String,
        /// Decision payload.
        payload: serde_json::Value,
    },
    /// Reverse a branch decision.
    Restart(S),
    /// Flag a stage as waiting on the user.
    RequireAction {
        /// The stage.
        stage: S,
        /// Message for the user.
        note: String,
    },
    /// The generation trigger failed.
    FailGeneration {
        /// The stage.
        stage: S,
        /// Trigger error.
        error: String,
    },
    /// Polling gave up.
    GenerationTimedOut {
        /// The stage.
        stage: S,
        /// Lookups performed.
        attempts: u32,
    },
    /// Trigger generation again.
    RetryGeneration(S),
}

impl<S: StageKey> PipelineCommand<S> {
    /// Operation name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Begin(_) => "begin_stage",
            Self::Complete(..) => "complete_stage",
            Self::Uncomplete { .. } => "uncomplete_stage",
            Self::Resolve { .. } => "resolve_branch",
            Self::Restart(_) => "restart_decision",
            Self::RequireAction { .. } => "require_action",
            Self::FailGeneration { .. } => "fail_generation",
            Self::GenerationTimedOut { .. } => "generation_timed_out",
            Self::RetryGeneration(_) => "retry_generation",
        }
    }
}

impl<S: StageKey> PipelineInstance<S> {
    /// Applies `command` in place.
    ///
    /// # Errors
    ///
    /// Whatever the underlying operation returns; the instance is unchanged on error.
    pub fn apply(&mut self, command: PipelineCommand<S>) -> Result<Transition<S>, PipelineError> {
        match command {
            PipelineCommand::Activate => Ok(self.activate()),
            PipelineCommand::Begin(stage) => self.begin_stage(stage),
            PipelineCommand::Complete(stage, evidence) => self.complete_stage(stage, evidence),
            PipelineCommand::Uncomplete { stage, reason } => self.uncomplete_stage(stage, &reason),
            PipelineCommand::Resolve {
                stage,
                outcome,
                payload,
            } => self.resolve_branch(stage, &outcome, payload),
            PipelineCommand::Restart(stage) => self.restart_decision(stage),
            PipelineCommand::RequireAction { stage, note } => self.require_action(stage, &note),
            PipelineCommand::FailGeneration { stage, error } => self.fail_generation(stage, &error),
            PipelineCommand::GenerationTimedOut { stage, attempts } => {
                self.generation_timed_out(stage, attempts)
            }
            PipelineCommand::RetryGeneration(stage) => self.retry_generation(stage),
        }
    }
}

/// Pure form of [`PipelineInstance::apply`]: returns the next instance and
/// leaves `instance` untouched.
///
/// # Errors
///
/// Whatever the underlying operation returns.
pub fn reduce<S: StageKey>(
    instance: &PipelineInstance<S>,
    command: PipelineCommand<S>,
) -> Result<(PipelineInstance<S>, Transition<S>), PipelineError> {
    let mut next = instance.clone();
    let transition = next.apply(command)?;
    Ok((next, transition))
}
