//! Immutable stage definitions.

use super::{CompletionKind, StageKey};

/// One possible outcome of a decision-branch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeSpec<S: StageKey> {
    /// Outcome name, as chosen by the user (e.g. "approve").
    pub name: String,
    /// Whether this outcome ends the pipeline by cascade-skipping downstream stages.
    pub terminating: bool,
    /// Reason recorded on stages skipped by this outcome.
    pub skip_reason: Option<String>,
    /// Explicit successor for this outcome; stages in between are bypassed.
    pub next: Option<S>,
    /// External job fired when this outcome is chosen (e.g. a decline email).
    pub notify_job: Option<String>,
}

impl<S: StageKey> OutcomeSpec<S> {
    /// Creates a non-terminating outcome that continues to the stage's successor.
    #[must_use]
    pub fn proceed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terminating: false,
            skip_reason: None,
            next: None,
            notify_job: None,
        }
    }

    /// Creates a terminating outcome that skips downstream stages with `reason`.
    #[must_use]
    pub fn terminate(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terminating: true,
            skip_reason: Some(reason.into()),
            next: None,
            notify_job: None,
        }
    }

    /// Routes this outcome to an explicit successor.
    #[must_use]
    pub fn jump_to(mut self, next: S) -> Self {
        self.next = Some(next);
        self
    }

    /// Fires `job` when this outcome is chosen.
    #[must_use]
    pub fn notify(mut self, job: impl Into<String>) -> Self {
        self.notify_job = Some(job.into());
        self
    }

    /// The reason recorded on stages skipped by this outcome.
    #[must_use]
    pub fn reason(&self) -> String {
        self.skip_reason.clone().unwrap_or_else(|| self.name.clone())
    }
}

/// The outcomes available at a decision-branch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSpec<S: StageKey> {
    /// Declared outcomes.
    pub outcomes: Vec<OutcomeSpec<S>>,
}

impl<S: StageKey> BranchSpec<S> {
    /// Creates a branch spec from its outcomes.
    #[must_use]
    pub fn new(outcomes: Vec<OutcomeSpec<S>>) -> Self {
        Self { outcomes }
    }

    /// Looks up an outcome by name.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&OutcomeSpec<S>> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Static definition of one stage. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition<S: StageKey> {
    /// Stage identifier.
    pub id: S,
    /// Position in the pipeline; gaps are allowed.
    pub order: i32,
    /// How the stage is satisfied.
    pub completion_kind: CompletionKind,
    /// Logical file type this stage produces or consumes.
    pub artifact_key: Option<String>,
    /// External job that generates the artifact.
    pub job_name: Option<String>,
    /// Explicit successor; defaults to the next stage by order.
    pub next_stage: Option<S>,
    /// Preserved when an upstream branch cascades a skip.
    pub exempt_from_cascade_skip: bool,
    /// Outcomes, for decision-branch stages.
    pub branch: Option<BranchSpec<S>>,
    /// Human-readable title.
    pub title: Option<String>,
}

impl<S: StageKey> StageDefinition<S> {
    /// Creates a new stage definition.
    #[must_use]
    pub fn new(id: S, order: i32, completion_kind: CompletionKind) -> Self {
        Self {
            id,
            order,
            completion_kind,
            artifact_key: None,
            job_name: None,
            next_stage: None,
            exempt_from_cascade_skip: false,
            branch: None,
            title: None,
        }
    }

    /// A stage completed by uploading a file of `artifact_key`.
    #[must_use]
    pub fn file_upload(id: S, order: i32, artifact_key: impl Into<String>) -> Self {
        Self::new(id, order, CompletionKind::FileUpload).with_artifact(artifact_key)
    }

    /// A stage completed by user confirmation.
    #[must_use]
    pub fn confirmation(id: S, order: i32) -> Self {
        Self::new(id, order, CompletionKind::UserConfirmation)
    }

    /// A decision-branch stage with the given outcomes.
    #[must_use]
    pub fn decision(id: S, order: i32, outcomes: Vec<OutcomeSpec<S>>) -> Self {
        let mut def = Self::new(id, order, CompletionKind::DecisionBranch);
        def.branch = Some(BranchSpec::new(outcomes));
        def
    }

    /// A stage completed when `job` produces `artifact_key`.
    #[must_use]
    pub fn generated(
        id: S,
        order: i32,
        artifact_key: impl Into<String>,
        job: impl Into<String>,
    ) -> Self {
        Self::new(id, order, CompletionKind::AutomatedGeneration)
            .with_artifact(artifact_key)
            .with_job(job)
    }

    /// A stage completed by a generated artifact or a manual upload.
    #[must_use]
    pub fn composite(
        id: S,
        order: i32,
        artifact_key: impl Into<String>,
        job: impl Into<String>,
    ) -> Self {
        Self::new(id, order, CompletionKind::Composite)
            .with_artifact(artifact_key)
            .with_job(job)
    }

    /// Sets the artifact key.
    #[must_use]
    pub fn with_artifact(mut self, key: impl Into<String>) -> Self {
        self.artifact_key = Some(key.into());
        self
    }

    /// Sets the generation job name.
    #[must_use]
    pub fn with_job(mut self, job: impl Into<String>) -> Self {
        self.job_name = Some(job.into());
        self
    }

    /// Sets the explicit successor.
    #[must_use]
    pub fn with_next(mut self, next: S) -> Self {
        self.next_stage = Some(next);
        self
    }

    /// Exempts the stage from cascade skips.
    #[must_use]
    pub fn exempt(mut self) -> Self {
        self.exempt_from_cascade_skip = true;
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returns true if the stage is satisfied by a decision.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.completion_kind == CompletionKind::DecisionBranch
    }

    /// Returns true if the stage is backed by a generation job.
    #[must_use]
    pub fn requires_generation(&self) -> bool {
        self.completion_kind.requires_generation()
    }
}
