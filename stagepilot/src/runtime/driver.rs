//! Runs a pipeline instance against real collaborators.

use super::persistence::{load_hydration, PersistenceWriter};
use crate::config::EngineConfig;
use crate::core::{CompletionEvidence, PipelineEvent, StageKey};
use crate::errors::PipelineError;
use crate::events::{get_event_sink, EventSink};
use crate::jobs::{AsyncJob, AsyncJobTracker, JobSignal, SignalHandler};
use crate::pipeline::{Effect, PipelineCommand, PipelineInstance, PipelineSnapshot, Transition};
use crate::ports::{
    ArtifactLookup, CompletionListener, InMemoryStageDataStore, JobTrigger, NoOpCompletionListener,
    NoOpJobTrigger, StageDataStore,
};
use crate::registry::StageRegistry;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Never finds anything. The default when no lookup is configured.
#[derive(Debug, Clone, Copy, Default)]
struct NoArtifacts;

#[async_trait]
impl ArtifactLookup for NoArtifacts {
    async fn find_by_type(
        &self,
        _subject_id: &str,
        _artifact_key: &str,
    ) -> Result<Option<crate::core::ArtifactRef>, crate::errors::ExternalIoError> {
        Ok(None)
    }
}

/// Builder for [`PipelineDriver`].
pub struct DriverBuilder<S: StageKey> {
    registry: Arc<StageRegistry<S>>,
    subject_id: String,
    config: EngineConfig,
    store: Arc<dyn StageDataStore>,
    lookup: Arc<dyn ArtifactLookup>,
    trigger: Arc<dyn JobTrigger>,
    listener: Arc<dyn CompletionListener>,
    sink: Option<Arc<dyn EventSink>>,
}

impl<S: StageKey> DriverBuilder<S> {
    fn new(registry: Arc<StageRegistry<S>>, subject_id: String) -> Self {
        Self {
            registry,
            subject_id,
            config: EngineConfig::default(),
            store: Arc::new(InMemoryStageDataStore::new()),
            lookup: Arc::new(NoArtifacts),
            trigger: Arc::new(NoOpJobTrigger),
            listener: Arc::new(NoOpCompletionListener),
            sink: None,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the stage-data store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn StageDataStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the artifact lookup polled by generation jobs.
    #[must_use]
    pub fn lookup(mut self, lookup: Arc<dyn ArtifactLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Sets the job trigger.
    #[must_use]
    pub fn trigger(mut self, trigger: Arc<dyn JobTrigger>) -> Self {
        self.trigger = trigger;
        self
    }

    /// Sets the completion listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn CompletionListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Sets the event sink. Defaults to the process-wide sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Starts a fresh pipeline with every stage pending.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn build(self) -> PipelineDriver<S> {
        let instance = PipelineInstance::new(Arc::clone(&self.registry), self.subject_id.clone());
        self.start(instance)
    }

    /// Rebuilds the pipeline from the store's completion flags and decisions.
    ///
    /// Store read failures are logged and the affected stages load as pending.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the store references stages the registry does not know.
    pub async fn load(self) -> Result<PipelineDriver<S>, PipelineError> {
        let sink = self.sink.clone().unwrap_or_else(get_event_sink);
        let hydration =
            load_hydration(self.store.as_ref(), &self.registry, &self.subject_id, sink.as_ref()).await;
        debug!(
            subject_id = %self.subject_id,
            completed = hydration.completed.len(),
            decisions = hydration.decisions.len(),
            "Hydrating pipeline"
        );
        let instance =
            PipelineInstance::hydrate(Arc::clone(&self.registry), self.subject_id.clone(), hydration)?;
        Ok(self.start(instance))
    }

    fn start(self, instance: PipelineInstance<S>) -> PipelineDriver<S> {
        let sink = self.sink.unwrap_or_else(get_event_sink);
        let mut instance = instance.with_auto_start_jobs(self.config.auto_start_jobs);
        let activation = instance.activate();
        let (snapshots, _) = watch::channel(instance.snapshot());
        let writer = PersistenceWriter::spawn(Arc::clone(&self.store), self.subject_id.clone(), Arc::clone(&sink));

        let lookup = self.lookup;
        let registry_name = self.registry.name().to_string();
        let inner = Arc::new_cyclic(|weak: &Weak<DriverInner<S>>| {
            let weak = weak.clone();
            let on_signal: SignalHandler<S> = Arc::new(move |signal| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_job_signal(signal);
                }
            });
            DriverInner {
                tracker: AsyncJobTracker::new(
                    self.subject_id.clone(),
                    lookup,
                    Arc::clone(&self.trigger),
                    self.config.poll.clone(),
                    on_signal,
                ),
                subject_id: self.subject_id,
                instance: Mutex::new(instance),
                writer,
                trigger: self.trigger,
                listener: self.listener,
                sink,
                persist: self.config.persist,
                snapshots,
            }
        });
        info!(subject_id = %inner.subject_id, pipeline = %registry_name, "Pipeline driver started");
        inner.execute(activation);
        PipelineDriver { inner }
    }
}

impl<S: StageKey> std::fmt::Debug for DriverBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverBuilder")
            .field("pipeline", &self.registry.name())
            .field("subject_id", &self.subject_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct DriverInner<S: StageKey> {
    subject_id: String,
    instance: Mutex<PipelineInstance<S>>,
    tracker: AsyncJobTracker<S>,
    writer: PersistenceWriter<S>,
    trigger: Arc<dyn JobTrigger>,
    listener: Arc<dyn CompletionListener>,
    sink: Arc<dyn EventSink>,
    persist: bool,
    snapshots: watch::Sender<PipelineSnapshot<S>>,
}

impl<S: StageKey> DriverInner<S> {
    fn dispatch(&self, command: PipelineCommand<S>) -> Result<PipelineSnapshot<S>, PipelineError> {
        let name = command.name();
        let (transition, snapshot) = {
            let mut instance = self.instance.lock();
            let transition = instance.apply(command).map_err(|err| {
                warn!(subject_id = %self.subject_id, operation = name, error = %err, "Transition rejected");
                err
            })?;
            let snapshot = instance.snapshot();
            // Published under the lock so subscribers see snapshots in transition order.
            if transition.changed {
                self.snapshots.send_replace(snapshot.clone());
            }
            (transition, snapshot)
        };
        self.execute(transition);
        Ok(snapshot)
    }

    /// Runs a transition's effects. Called without the instance lock held.
    fn execute(&self, transition: Transition<S>) {
        for event in transition.events {
            self.sink.try_emit(event);
        }
        for effect in transition.effects {
            match effect {
                Effect::StartJob {
                    stage,
                    artifact_key,
                    job_name,
                } => {
                    self.tracker.start(stage, &artifact_key, &job_name);
                }
                Effect::CancelJob { stage } => {
                    if self.tracker.cancel(stage) {
                        self.emit(PipelineEvent::job_cancelled(stage.as_str()));
                    }
                }
                Effect::Persist(write) => {
                    if self.persist {
                        self.writer.submit(write);
                    }
                }
                Effect::TriggerJob { stage, job_name } => self.fire_notification(stage, job_name),
                Effect::PipelineCompleted => self.notify_completion(),
            }
        }
    }

    fn fire_notification(&self, stage: S, job_name: String) {
        let trigger = Arc::clone(&self.trigger);
        let sink = Arc::clone(&self.sink);
        let subject_id = self.subject_id.clone();
        tokio::spawn(async move {
            if let Err(error) = trigger.trigger(&job_name, &subject_id).await {
                warn!(subject_id = %subject_id, stage = %stage, job = %job_name, error = %error, "Notification trigger failed");
                sink.emit(
                    PipelineEvent::trigger_failed(&job_name, &error.to_string())
                        .add_data("stage", serde_json::json!(stage.as_str()))
                        .for_subject(subject_id),
                )
                .await;
            }
        });
    }

    fn notify_completion(&self) {
        let listener = Arc::clone(&self.listener);
        let subject_id = self.subject_id.clone();
        tokio::spawn(async move {
            if let Err(error) = listener.on_pipeline_complete(&subject_id).await {
                warn!(subject_id = %subject_id, error = %error, "Completion listener failed");
            }
        });
    }

    fn on_job_signal(&self, signal: JobSignal<S>) {
        let stage = signal.stage();
        let command = match signal {
            JobSignal::Found { stage, artifact } => {
                if !self.instance.lock().status(stage).is_awaiting_generation() {
                    debug!(subject_id = %self.subject_id, stage = %stage, "Artifact found for settled stage; ignored");
                    return;
                }
                self.emit(PipelineEvent::job_found(stage.as_str(), &artifact.id));
                PipelineCommand::Complete(stage, CompletionEvidence::FileArrived(artifact))
            }
            JobSignal::TriggerFailed {
                stage,
                job_name,
                error,
            } => {
                self.emit(
                    PipelineEvent::trigger_failed(&job_name, &error.to_string())
                        .add_data("stage", serde_json::json!(stage.as_str())),
                );
                PipelineCommand::FailGeneration {
                    stage,
                    error: error.to_string(),
                }
            }
            JobSignal::TimedOut { stage, attempts } => {
                let timeout = PipelineError::PollTimeout {
                    stage: stage.to_string(),
                    attempts,
                };
                warn!(subject_id = %self.subject_id, code = timeout.code(), error = %timeout, "Stage needs a manual upload or retry");
                PipelineCommand::GenerationTimedOut { stage, attempts }
            }
        };
        if let Err(err) = self.dispatch(command) {
            warn!(subject_id = %self.subject_id, stage = %stage, error = %err, "Job signal could not be applied");
        }
    }

    fn emit(&self, event: PipelineEvent) {
        self.sink.try_emit(event.for_subject(self.subject_id.clone()));
    }
}

/// Owns one subject's pipeline: applies transitions, runs their effects and
/// publishes snapshots.
///
/// Transitions are serialized by an internal lock and applied immediately;
/// persistence, job triggers and completion notification run in the
/// background and never roll the in-memory state back. Dropping the driver
/// cancels every polling job. Must be used within a Tokio runtime.
pub struct PipelineDriver<S: StageKey> {
    inner: Arc<DriverInner<S>>,
}

impl<S: StageKey> PipelineDriver<S> {
    /// Starts configuring a driver for `subject_id`.
    #[must_use]
    pub fn builder(registry: Arc<StageRegistry<S>>, subject_id: impl Into<String>) -> DriverBuilder<S> {
        DriverBuilder::new(registry, subject_id.into())
    }

    /// The subject id.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.inner.subject_id
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot<S> {
        self.inner.instance.lock().snapshot()
    }

    /// Receives a new snapshot after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot<S>> {
        self.inner.snapshots.subscribe()
    }

    /// Applies any command.
    ///
    /// # Errors
    ///
    /// Whatever the transition returns; state is unchanged on error.
    pub fn dispatch(&self, command: PipelineCommand<S>) -> Result<PipelineSnapshot<S>, PipelineError> {
        self.inner.dispatch(command)
    }

    /// See [`PipelineInstance::complete_stage`].
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for skipped stages or mismatched evidence.
    pub fn complete_stage(
        &self,
        stage: S,
        evidence: CompletionEvidence,
    ) -> Result<PipelineSnapshot<S>, PipelineError> {
        self.dispatch(PipelineCommand::Complete(stage, evidence))
    }

    /// See [`PipelineInstance::uncomplete_stage`].
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for decision or skipped stages.
    pub fn uncomplete_stage(&self, stage: S, reason: impl Into<String>) -> Result<PipelineSnapshot<S>, PipelineError> {
        self.dispatch(PipelineCommand::Uncomplete {
            stage,
            reason: reason.into(),
        })
    }

    /// See [`PipelineInstance::resolve_branch`].
    ///
    /// # Errors
    ///
    /// `Validation` for unknown outcomes; `InvalidTransition` otherwise.
    pub fn resolve_branch(
        &self,
        stage: S,
        outcome: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<PipelineSnapshot<S>, PipelineError> {
        self.dispatch(PipelineCommand::Resolve {
            stage,
            outcome: outcome.into(),
            payload,
        })
    }

    /// See [`PipelineInstance::restart_decision`].
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage is not a decision stage.
    pub fn restart_decision(&self, stage: S) -> Result<PipelineSnapshot<S>, PipelineError> {
        self.dispatch(PipelineCommand::Restart(stage))
    }

    /// See [`PipelineInstance::retry_generation`].
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stage has no generation job or is settled.
    pub fn retry_generation(&self, stage: S) -> Result<PipelineSnapshot<S>, PipelineError> {
        self.dispatch(PipelineCommand::RetryGeneration(stage))
    }

    /// Returns true if the stage has a running generation job.
    #[must_use]
    pub fn is_polling(&self, stage: S) -> bool {
        self.inner.tracker.is_polling(stage)
    }

    /// Stages with a running generation job.
    #[must_use]
    pub fn active_jobs(&self) -> Vec<S> {
        self.inner.tracker.active_stages()
    }

    /// The stage's most recent generation job.
    #[must_use]
    pub fn job(&self, stage: S) -> Option<AsyncJob<S>> {
        self.inner.tracker.job(stage)
    }

    /// Resolves once every queued store write was attempted.
    pub async fn flush(&self) {
        self.inner.writer.flush().await;
    }

    /// Cancels every polling job. Transitions remain available.
    pub fn shutdown(&self) {
        self.inner.tracker.cancel_all();
        info!(subject_id = %self.inner.subject_id, "Pipeline driver shut down");
    }
}

impl<S: StageKey> Drop for PipelineDriver<S> {
    fn drop(&mut self) {
        self.inner.tracker.cancel_all();
    }
}

impl<S: StageKey> std::fmt::Debug for PipelineDriver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDriver")
            .field("subject_id", &self.inner.subject_id)
            .field("tracker", &self.inner.tracker)
            .finish_non_exhaustive()
    }
}
