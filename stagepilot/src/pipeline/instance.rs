//! The per-subject pipeline state machine.

use super::board::{SkipRecord, StageBoard};
use super::branch::{BranchRoute, DecisionBranchResolver};
use super::cascade::{CascadeSkipEngine, SkippedStage};
use super::derive;
use super::effects::{Effect, Transition};
use super::snapshot::PipelineSnapshot;
use crate::core::{
    CompletionEvidence, PipelineEvent, StageDefinition, StageKey, StageStatus,
};
use crate::errors::{InvalidTransitionError, PipelineError};
use crate::ports::keys;
use crate::registry::StageRegistry;
use crate::utils::{now_utc, Timestamp};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A decision recorded at a branch stage.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchDecision<S: StageKey> {
    /// The branch stage.
    pub stage: S,
    /// Chosen outcome name.
    pub outcome: String,
    /// Data attached to the decision.
    pub payload: serde_json::Value,
    /// Whether the outcome cascaded a skip.
    pub terminating: bool,
    /// When the decision was made.
    pub decided_at: Timestamp,
}

/// Why a pipeline ended early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalReason<S: StageKey> {
    /// The branch stage whose decision ended the pipeline.
    pub stage: S,
    /// The reason recorded on skipped stages.
    pub reason: String,
}

/// Persisted state used to rebuild an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Hydration<S: StageKey> {
    /// Stages whose completion flag was persisted.
    pub completed: Vec<S>,
    /// Persisted branch decisions: stage, outcome, payload.
    pub decisions: Vec<(S, String, serde_json::Value)>,
}

impl<S: StageKey> Default for Hydration<S> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            decisions: Vec::new(),
        }
    }
}

/// A pipeline for one subject (a lead, a brief, a hypothesis).
///
/// The instance exclusively owns the status and visibility maps; callers
/// change them only through the transition operations and read them only
/// through [`snapshot`](Self::snapshot). Every operation validates before it
/// mutates, so an `Err` leaves the instance untouched.
#[derive(Debug, Clone)]
pub struct PipelineInstance<S: StageKey> {
    registry: Arc<StageRegistry<S>>,
    subject_id: String,
    board: StageBoard<S>,
    /// Decisions in the order they were made.
    decisions: Vec<BranchDecision<S>>,
    terminal: Option<TerminalReason<S>>,
    completion_signaled: bool,
    auto_start_jobs: bool,
}

impl<S: StageKey> PipelineInstance<S> {
    /// Creates a fresh instance with every stage pending and the first one expanded.
    #[must_use]
    pub fn new(registry: Arc<StageRegistry<S>>, subject_id: impl Into<String>) -> Self {
        let board = StageBoard::new(registry.ordered_ids());
        let mut instance = Self {
            registry,
            subject_id: subject_id.into(),
            board,
            decisions: Vec::new(),
            terminal: None,
            completion_signaled: false,
            auto_start_jobs: true,
        };
        instance.reset_visibility();
        instance
    }

    /// Rebuilds an instance from persisted completion flags and decisions.
    ///
    /// Decisions are replayed in stage order so cascades are reconstructed;
    /// their side effects are discarded. A pipeline that is already complete
    /// does not signal completion again. Decisions that no longer apply
    /// (their stage was skipped by an earlier one) are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a persisted stage is not registered.
    pub fn hydrate(
        registry: Arc<StageRegistry<S>>,
        subject_id: impl Into<String>,
        hydration: Hydration<S>,
    ) -> Result<Self, PipelineError> {
        let mut instance = Self::new(registry, subject_id);
        instance.auto_start_jobs = false;
        for stage in hydration.completed {
            instance.registry.position(stage)?;
            instance.board.set_status(stage, StageStatus::Completed);
        }

        let mut keyed = Vec::with_capacity(hydration.decisions.len());
        for (stage, outcome, payload) in hydration.decisions {
            keyed.push((instance.registry.position(stage)?, stage, outcome, payload));
        }
        keyed.sort_by_key(|(pos, ..)| *pos);

        for (_, stage, outcome, payload) in keyed {
            if let Err(err) = instance.resolve_branch(stage, &outcome, payload) {
                warn!(
                    subject_id = %instance.subject_id,
                    stage = %stage,
                    outcome = %outcome,
                    error = %err,
                    "Dropping persisted decision that no longer applies"
                );
            }
        }

        instance.completion_signaled = instance.is_complete();
        instance.auto_start_jobs = true;
        instance.reset_visibility();
        Ok(instance)
    }

    /// Disables automatic job starts when a generation stage becomes current.
    #[must_use]
    pub fn with_auto_start_jobs(mut self, enabled: bool) -> Self {
        self.auto_start_jobs = enabled;
        self
    }

    /// Returns the subject id.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<StageRegistry<S>> {
        &self.registry
    }

    /// Returns the status of `stage`.
    #[must_use]
    pub fn status(&self, stage: S) -> StageStatus {
        self.board.status(stage)
    }

    /// Returns true if `stage` is collapsed.
    #[must_use]
    pub fn is_collapsed(&self, stage: S) -> bool {
        self.board.is_collapsed(stage)
    }

    /// Returns the skip record of `stage`.
    #[must_use]
    pub fn skip_record(&self, stage: S) -> Option<&SkipRecord<S>> {
        self.board.skip_record(stage)
    }

    /// The first open stage by order, if any.
    #[must_use]
    pub fn current_stage(&self) -> Option<S> {
        derive::current_stage(&self.registry, self.board.statuses())
    }

    /// No open stage remains and no terminating decision is in effect.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        derive::is_complete(&self.registry, self.board.statuses(), self.terminal.is_some())
    }

    /// The terminating decision in effect, if any.
    #[must_use]
    pub fn terminal_reason(&self) -> Option<&TerminalReason<S>> {
        self.terminal.as_ref()
    }

    /// The most recent branch decision.
    #[must_use]
    pub fn branch_outcome(&self) -> Option<&BranchDecision<S>> {
        self.decisions.last()
    }

    /// The decision recorded at `stage`.
    #[must_use]
    pub fn decision_at(&self, stage: S) -> Option<&BranchDecision<S>> {
        self.decisions.iter().find(|d| d.stage == stage)
    }

    /// Whether the one-shot completion signal has fired.
    #[must_use]
    pub fn completion_signaled(&self) -> bool {
        self.completion_signaled
    }

    /// Copies the current state for a renderer.
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot<S> {
        PipelineSnapshot {
            subject_id: self.subject_id.clone(),
            order: self.registry.ordered_ids().collect(),
            status_map: self.board.statuses().clone(),
            visibility_map: self.board.collapsed_map().clone(),
            skip_reasons: self
                .board
                .skip_records()
                .iter()
                .map(|(stage, record)| (*stage, record.reason.clone()))
                .collect(),
            current_stage: self.current_stage(),
            is_complete: self.is_complete(),
            terminal_reason: self.terminal.clone(),
            branch_outcome: self.decisions.last().cloned(),
        }
    }

    /// Starts the generation job of the current stage if it needs one, and
    /// fires the completion signal for an already-finished pipeline.
    ///
    /// Call once after construction.
    pub fn activate(&mut self) -> Transition<S> {
        let mut t = Transition::new();
        self.finish(&mut t);
        t
    }

    /// Marks `stage` completed.
    ///
    /// Completing an already-completed stage changes no status but still
    /// collapses the stage and expands a pending successor. Branch-decision
    /// evidence is routed to [`resolve_branch`](Self::resolve_branch).
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage is skipped, the evidence does not fit
    /// the stage's completion kind, or a file's artifact key does not match.
    pub fn complete_stage(
        &mut self,
        stage: S,
        evidence: CompletionEvidence,
    ) -> Result<Transition<S>, PipelineError> {
        let registry = Arc::clone(&self.registry);
        let def = registry.definition_of(stage)?;

        if let CompletionEvidence::BranchDecision { outcome, payload } = &evidence {
            return self.resolve_branch(stage, outcome, payload.clone());
        }

        let status = self.board.status(stage);
        if status == StageStatus::Skipped {
            return Err(self.refuse(stage, "complete_stage", "stage is skipped"));
        }
        if !def.completion_kind.accepts(&evidence) {
            return Err(self.refuse(
                stage,
                "complete_stage",
                format!(
                    "{} stage cannot be completed by {}",
                    def.completion_kind,
                    evidence.label()
                ),
            ));
        }
        if let (CompletionEvidence::FileArrived(artifact), Some(expected)) =
            (&evidence, &def.artifact_key)
        {
            if artifact.artifact_key != *expected {
                return Err(self.refuse(
                    stage,
                    "complete_stage",
                    format!(
                        "artifact '{}' does not match stage artifact '{expected}'",
                        artifact.artifact_key
                    ),
                ));
            }
        }

        let evidence_write = match &evidence {
            CompletionEvidence::FileArrived(artifact) => Some((keys::ARTIFACT, serde_json::to_value(artifact)?)),
            CompletionEvidence::UserConfirmed => Some((keys::CONFIRMED, serde_json::json!(true))),
            CompletionEvidence::BranchDecision { .. } => None,
        };
        let successor = registry.successor_of(stage)?;

        let mut t = Transition::new();
        if status == StageStatus::Completed {
            debug!(subject_id = %self.subject_id, stage = %stage, "Stage already completed");
        } else {
            self.board.set_status(stage, StageStatus::Completed);
            t.changed = true;
            if def.requires_generation() {
                t.push(Effect::CancelJob { stage });
            }
            t.persist_set(stage, keys::STATUS, serde_json::json!(keys::COMPLETED));
            if let Some((key, value)) = evidence_write {
                t.persist_set(stage, key, value);
            }
            t.emit(self.event(PipelineEvent::completed(stage.as_str(), evidence.label())));
            info!(subject_id = %self.subject_id, stage = %stage, evidence = evidence.label(), "Stage completed");
        }

        self.advance_visibility(stage, successor);
        self.finish(&mut t);
        Ok(t)
    }

    /// Returns a completed (or in-flight) stage to `Pending`, e.g. when its
    /// file is cleared.
    ///
    /// The stage is expanded; its successor is collapsed unless the successor
    /// is already completed.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for decision stages (use
    /// [`restart_decision`](Self::restart_decision)) and skipped stages.
    pub fn uncomplete_stage(&mut self, stage: S, reason: &str) -> Result<Transition<S>, PipelineError> {
        let registry = Arc::clone(&self.registry);
        let def = registry.definition_of(stage)?;
        if def.is_branch() {
            return Err(self.refuse(
                stage,
                "uncomplete_stage",
                "decision stages are reopened with restart_decision",
            ));
        }
        let status = self.board.status(stage);
        if status == StageStatus::Skipped {
            return Err(self.refuse(stage, "uncomplete_stage", "stage is skipped"));
        }
        let successor = registry.successor_of(stage)?;

        let mut t = Transition::new();
        if status != StageStatus::Pending {
            self.board.set_status(stage, StageStatus::Pending);
            t.changed = true;
            if def.requires_generation() && status == StageStatus::InProgress {
                t.push(Effect::CancelJob { stage });
            }
            t.persist_delete(stage);
            t.emit(self.event(PipelineEvent::reopened(stage.as_str(), reason)));
            info!(subject_id = %self.subject_id, stage = %stage, reason, "Stage reopened");
        }

        self.board.expand(stage);
        if let Some(next) = successor {
            if self.board.status(next) != StageStatus::Completed {
                self.board.collapse(next);
            }
        }
        self.finish(&mut t);
        Ok(t)
    }

    /// Records the decision made at a branch stage and routes the pipeline.
    ///
    /// A terminating outcome cascade-skips every non-exempt downstream stage
    /// and sets the terminal reason. A non-terminating outcome continues to
    /// its successor, skipping any stages it jumps over.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage is not a decision stage, is skipped,
    /// or already holds a decision; `Validation` for an unknown outcome.
    pub fn resolve_branch(
        &mut self,
        stage: S,
        outcome: &str,
        payload: serde_json::Value,
    ) -> Result<Transition<S>, PipelineError> {
        let registry = Arc::clone(&self.registry);
        let resolution = DecisionBranchResolver::resolve(&registry, stage, outcome)?;
        if self.board.status(stage) == StageStatus::Skipped {
            return Err(self.refuse(stage, "resolve_branch", "stage is skipped"));
        }
        if let Some(existing) = self.decision_at(stage) {
            return Err(self.refuse(
                stage,
                "resolve_branch",
                format!(
                    "decision '{}' already recorded; restart the decision first",
                    existing.outcome
                ),
            ));
        }

        let mut t = Transition::new();
        t.changed = true;
        self.board.set_status(stage, StageStatus::Completed);
        t.persist_set(stage, keys::STATUS, serde_json::json!(keys::COMPLETED));
        t.persist_set(
            stage,
            keys::BRANCH_OUTCOME,
            serde_json::json!({ "outcome": outcome, "payload": payload }),
        );
        if let Some(job) = &resolution.outcome.notify_job {
            t.push(Effect::TriggerJob {
                stage,
                job_name: job.clone(),
            });
        }

        let terminating = resolution.is_terminating();
        self.decisions.push(BranchDecision {
            stage,
            outcome: outcome.to_string(),
            payload,
            terminating,
            decided_at: now_utc(),
        });
        t.emit(self.event(PipelineEvent::branch_resolved(stage.as_str(), outcome, terminating)));
        info!(subject_id = %self.subject_id, stage = %stage, outcome, terminating, "Branch resolved");

        match &resolution.route {
            BranchRoute::Terminate { reason } => {
                let exempt = self.exempt_set();
                let downstream: Vec<S> = registry
                    .stages_after(stage)?
                    .iter()
                    .map(|def| def.id)
                    .filter(|id| !exempt.contains(id))
                    .collect();
                self.withdraw_decisions(&mut t, &downstream, stage);
                let skipped =
                    CascadeSkipEngine::apply_skip(&registry, &mut self.board, stage, reason, &exempt)?;
                self.record_skips(&mut t, &skipped, stage, reason);
                self.terminal = Some(TerminalReason {
                    stage,
                    reason: reason.clone(),
                });
                t.emit(self.event(PipelineEvent::pipeline_terminated(stage.as_str(), reason)));
                self.board.collapse(stage);
            }
            BranchRoute::Continue { next, bypassed } => {
                if !bypassed.is_empty() {
                    self.withdraw_decisions(&mut t, bypassed, stage);
                    let reason = format!("bypassed by '{outcome}'");
                    let skipped =
                        CascadeSkipEngine::skip_stages(&mut self.board, bypassed, stage, &reason);
                    self.record_skips(&mut t, &skipped, stage, &reason);
                }
                self.advance_visibility(stage, *next);
            }
        }

        self.finish(&mut t);
        Ok(t)
    }

    /// Reverses a decision: every stage skipped on its behalf returns to
    /// `Pending`, the decision and its terminal reason are cleared, and the
    /// branch stage is reopened and expanded. The stage the decision routed
    /// to returns to `Pending` if work on it had started, cancelling its job. Cascades of other terminating
    /// decisions still standing are applied again.
    ///
    /// Safe to call when no decision or cascade is in effect. Notifications
    /// fired by the decision are not undone.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage is not a decision stage or is itself skipped.
    pub fn restart_decision(&mut self, stage: S) -> Result<Transition<S>, PipelineError> {
        let registry = Arc::clone(&self.registry);
        let def = registry.definition_of(stage)?;
        if !def.is_branch() {
            return Err(self.refuse(stage, "restart_decision", "stage is not a decision"));
        }
        if self.board.status(stage) == StageStatus::Skipped {
            return Err(self.refuse(stage, "restart_decision", "stage is skipped"));
        }

        let mut t = Transition::new();
        let reverted = CascadeSkipEngine::reverse_skip(&registry, &mut self.board, stage);
        for &reopened in &reverted {
            t.emit(self.event(PipelineEvent::unskipped(reopened.as_str(), stage.as_str())));
        }

        let opened = self
            .decision_at(stage)
            .and_then(|d| DecisionBranchResolver::resolve(&registry, stage, &d.outcome).ok())
            .and_then(|resolution| resolution.next());
        let had_decision = self.decisions.iter().any(|d| d.stage == stage);
        self.decisions.retain(|d| d.stage != stage);

        // The stage the decision routed to goes back to waiting on it.
        if let Some(next) = opened {
            let status = self.board.status(next);
            if matches!(
                status,
                StageStatus::InProgress | StageStatus::ActionRequired | StageStatus::Failed
            ) {
                self.board.set_status(next, StageStatus::Pending);
                self.board.collapse(next);
                t.changed = true;
                if registry.definition_of(next).is_ok_and(StageDefinition::requires_generation) {
                    t.push(Effect::CancelJob { stage: next });
                }
                t.emit(self.event(PipelineEvent::reopened(next.as_str(), "decision restarted")));
            }
        }

        // Terminating decisions still in effect keep their cascade.
        let standing: Vec<TerminalReason<S>> = self
            .decisions
            .iter()
            .filter(|d| d.terminating)
            .filter_map(|d| {
                let outcome = registry.definition_of(d.stage).ok()?.branch.as_ref()?.outcome(&d.outcome)?;
                Some(TerminalReason {
                    stage: d.stage,
                    reason: outcome.reason(),
                })
            })
            .collect();
        let exempt = self.exempt_set();
        for terminal in &standing {
            let skipped = CascadeSkipEngine::apply_skip(
                &registry,
                &mut self.board,
                terminal.stage,
                &terminal.reason,
                &exempt,
            )?;
            self.record_skips(&mut t, &skipped, terminal.stage, &terminal.reason);
        }
        self.terminal = standing.into_iter().last();

        let previous = self.board.status(stage);
        self.board.set_status(stage, StageStatus::Pending);
        self.board.expand(stage);
        t.changed |= previous != StageStatus::Pending || !reverted.is_empty();
        if had_decision || previous != StageStatus::Pending {
            t.persist_delete(stage);
        }
        t.emit(self.event(PipelineEvent::branch_restarted(stage.as_str(), reverted.len())));
        info!(subject_id = %self.subject_id, stage = %stage, reverted = reverted.len(), "Decision restarted");

        self.finish(&mut t);
        Ok(t)
    }

    /// Moves a pending stage to `InProgress`.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the stage is pending or already in progress.
    pub fn begin_stage(&mut self, stage: S) -> Result<Transition<S>, PipelineError> {
        self.registry.definition_of(stage)?;
        let mut t = Transition::new();
        match self.board.status(stage) {
            StageStatus::InProgress => {}
            StageStatus::Pending => {
                self.board.set_status(stage, StageStatus::InProgress);
                self.board.expand(stage);
                t.changed = true;
                t.emit(self.event(PipelineEvent::started(stage.as_str())));
            }
            other => {
                return Err(self.refuse(stage, "begin_stage", format!("stage is {other}")));
            }
        }
        Ok(t)
    }

    /// Flags an open stage as waiting on the user.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage is completed or skipped.
    pub fn require_action(&mut self, stage: S, note: &str) -> Result<Transition<S>, PipelineError> {
        self.registry.definition_of(stage)?;
        let status = self.board.status(stage);
        if status.is_settled() {
            return Err(self.refuse(stage, "require_action", format!("stage is {status}")));
        }
        let mut t = Transition::new();
        if status != StageStatus::ActionRequired {
            self.board.set_status(stage, StageStatus::ActionRequired);
            self.board.expand(stage);
            t.changed = true;
            t.emit(self.event(PipelineEvent::action_required(stage.as_str(), note)));
        }
        Ok(t)
    }

    /// Records that the generation trigger for `stage` errored.
    ///
    /// The stage moves to `Failed`, not `ActionRequired`; the latter is left to
    /// polls that gave up and explicit requests. Both count as open.
    ///
    /// Only an in-progress stage fails; anything else (e.g. a manual upload
    /// already completed it) makes this a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage has no generation job.
    pub fn fail_generation(&mut self, stage: S, error: &str) -> Result<Transition<S>, PipelineError> {
        self.generation_definition(stage, "fail_generation")?;
        let mut t = Transition::new();
        if self.board.status(stage) == StageStatus::InProgress {
            self.board.set_status(stage, StageStatus::Failed);
            self.board.expand(stage);
            t.changed = true;
            t.push(Effect::CancelJob { stage });
            t.emit(self.event(PipelineEvent::failed(stage.as_str(), error)));
            warn!(subject_id = %self.subject_id, stage = %stage, error, "Generation failed");
        }
        Ok(t)
    }

    /// Records that polling for `stage` gave up; the user must upload or retry.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage has no generation job.
    pub fn generation_timed_out(&mut self, stage: S, attempts: u32) -> Result<Transition<S>, PipelineError> {
        self.generation_definition(stage, "generation_timed_out")?;
        let mut t = Transition::new();
        if self.board.status(stage) == StageStatus::InProgress {
            self.board.set_status(stage, StageStatus::ActionRequired);
            self.board.expand(stage);
            t.changed = true;
            t.emit(self.event(PipelineEvent::job_timed_out(stage.as_str(), attempts)));
        }
        Ok(t)
    }

    /// Re-triggers generation for an open stage.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage has no generation job or is settled.
    pub fn retry_generation(&mut self, stage: S) -> Result<Transition<S>, PipelineError> {
        let def = self.generation_definition(stage, "retry_generation")?.clone();
        let status = self.board.status(stage);
        if status.is_settled() {
            return Err(self.refuse(stage, "retry_generation", format!("stage is {status}")));
        }
        let mut t = Transition::new();
        t.changed = status != StageStatus::InProgress;
        self.start_job(&mut t, &def);
        self.board.expand(stage);
        Ok(t)
    }

    fn generation_definition(
        &self,
        stage: S,
        operation: &'static str,
    ) -> Result<&StageDefinition<S>, PipelineError> {
        let def = self.registry.definition_of(stage)?;
        if !def.requires_generation() {
            return Err(self.refuse(
                stage,
                operation,
                format!("{} stage has no generation job", def.completion_kind),
            ));
        }
        Ok(def)
    }

    fn start_job(&mut self, t: &mut Transition<S>, def: &StageDefinition<S>) {
        let (Some(artifact_key), Some(job_name)) = (&def.artifact_key, &def.job_name) else {
            return;
        };
        self.board.set_status(def.id, StageStatus::InProgress);
        t.push(Effect::StartJob {
            stage: def.id,
            artifact_key: artifact_key.clone(),
            job_name: job_name.clone(),
        });
        t.emit(self.event(PipelineEvent::job_started(def.id.as_str(), artifact_key)));
    }

    fn exempt_set(&self) -> HashSet<S> {
        self.registry
            .ordered_stages()
            .iter()
            .filter(|d| d.exempt_from_cascade_skip)
            .map(|d| d.id)
            .collect()
    }

    /// Drops decisions held by branch stages about to be skipped from
    /// `source`, returning the stages those decisions skipped to `Pending`.
    ///
    /// A skipped branch stage never holds a decision.
    fn withdraw_decisions(&mut self, t: &mut Transition<S>, stages: &[S], source: S) {
        let held: Vec<S> = self
            .decisions
            .iter()
            .map(|d| d.stage)
            .filter(|held| stages.contains(held))
            .collect();
        for branch in held {
            let registry = Arc::clone(&self.registry);
            let reverted = CascadeSkipEngine::reverse_skip(&registry, &mut self.board, branch);
            for &reopened in &reverted {
                t.emit(self.event(PipelineEvent::unskipped(reopened.as_str(), branch.as_str())));
            }
            self.decisions.retain(|d| d.stage != branch);
            if self.terminal.as_ref().is_some_and(|terminal| terminal.stage == branch) {
                self.terminal = None;
            }
            t.changed = true;
            t.persist_delete(branch);
            debug!(subject_id = %self.subject_id, stage = %branch, source = %source, "Decision withdrawn");
        }
    }

    fn record_skips(&self, t: &mut Transition<S>, skipped: &[SkippedStage<S>], source: S, reason: &str) {
        for entry in skipped {
            t.changed = true;
            if entry.previous == StageStatus::InProgress
                && self
                    .registry
                    .definition_of(entry.stage)
                    .is_ok_and(|def| def.requires_generation())
            {
                t.push(Effect::CancelJob { stage: entry.stage });
            }
            t.emit(self.event(PipelineEvent::skipped(entry.stage.as_str(), reason, source.as_str())));
        }
    }

    /// Collapses `stage` and expands `next` if it is still pending.
    ///
    /// Never collapses any other stage, so earlier expanded stages stay open.
    fn advance_visibility(&mut self, stage: S, next: Option<S>) {
        self.board.collapse(stage);
        if let Some(next) = next {
            if self.board.status(next) == StageStatus::Pending {
                self.board.expand(next);
            }
        }
    }

    /// Collapses everything except the current stage.
    fn reset_visibility(&mut self) {
        let current = self.current_stage();
        let ids: Vec<S> = self.registry.ordered_ids().collect();
        for id in ids {
            if Some(id) == current {
                self.board.expand(id);
            } else {
                self.board.collapse(id);
            }
        }
    }

    /// Post-transition bookkeeping shared by every operation.
    fn finish(&mut self, t: &mut Transition<S>) {
        match self.current_stage() {
            Some(current) => {
                if !self.auto_start_jobs || self.board.status(current) != StageStatus::Pending {
                    return;
                }
                let registry = Arc::clone(&self.registry);
                if let Ok(def) = registry.definition_of(current) {
                    if def.requires_generation() {
                        self.start_job(t, def);
                    }
                }
            }
            None => {
                if self.terminal.is_none() && !self.completion_signaled {
                    self.completion_signaled = true;
                    t.push(Effect::PipelineCompleted);
                    t.emit(self.event(PipelineEvent::pipeline_completed()));
                    info!(subject_id = %self.subject_id, "Pipeline completed");
                }
            }
        }
    }

    fn event(&self, event: PipelineEvent) -> PipelineEvent {
        event.for_subject(self.subject_id.clone())
    }

    fn refuse(&self, stage: S, operation: &'static str, reason: impl Into<String>) -> PipelineError {
        InvalidTransitionError::new(stage.as_str(), operation, reason).into()
    }
}
