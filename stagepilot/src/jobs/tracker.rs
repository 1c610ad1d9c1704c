//! Background polling for generated artifacts.

use super::job::{AsyncJob, JobSignal, JobState};
use crate::cancellation::CancellationToken;
use crate::config::PollConfig;
use crate::core::StageKey;
use crate::observability::job_span;
use crate::ports::{ArtifactLookup, JobTrigger};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Instrument};

/// Receives job signals. Never called while the tracker's lock is held, and
/// never after the job was cancelled.
pub type SignalHandler<S> = Arc<dyn Fn(JobSignal<S>) + Send + Sync>;

struct JobEntry<S: StageKey> {
    job: Arc<Mutex<AsyncJob<S>>>,
    token: Arc<CancellationToken>,
    handle: JoinHandle<()>,
}

impl<S: StageKey> JobEntry<S> {
    fn is_running(&self) -> bool {
        !self.handle.is_finished() && self.job.lock().state.is_active()
    }

    fn stop(self, reason: &str) {
        self.token.cancel(reason);
        self.handle.abort();
        self.job.lock().settle(JobState::Cancelled);
    }
}

/// Owns at most one polling job per generation stage for one subject.
///
/// Dropping the tracker cancels every job.
pub struct AsyncJobTracker<S: StageKey> {
    subject_id: String,
    lookup: Arc<dyn ArtifactLookup>,
    trigger: Arc<dyn JobTrigger>,
    poll: PollConfig,
    on_signal: SignalHandler<S>,
    jobs: Mutex<HashMap<S, JobEntry<S>>>,
}

impl<S: StageKey> AsyncJobTracker<S> {
    /// Creates a tracker for `subject_id`.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        lookup: Arc<dyn ArtifactLookup>,
        trigger: Arc<dyn JobTrigger>,
        poll: PollConfig,
        on_signal: SignalHandler<S>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            lookup,
            trigger,
            poll,
            on_signal,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Triggers `job_name` and polls for `artifact_key` until it appears.
    ///
    /// Returns false (and does nothing) if the stage already has a running job.
    /// Must be called within a Tokio runtime.
    pub fn start(&self, stage: S, artifact_key: &str, job_name: &str) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.get(&stage).is_some_and(JobEntry::is_running) {
            debug!(subject_id = %self.subject_id, stage = %stage, "Job already polling");
            return false;
        }

        let job = Arc::new(Mutex::new(AsyncJob::new(stage, artifact_key, job_name)));
        let token = Arc::new(CancellationToken::new());
        let task = PollTask {
            subject_id: self.subject_id.clone(),
            stage,
            artifact_key: artifact_key.to_string(),
            job_name: job_name.to_string(),
            lookup: Arc::clone(&self.lookup),
            trigger: Arc::clone(&self.trigger),
            poll: self.poll.clone(),
            on_signal: Arc::clone(&self.on_signal),
            job: Arc::clone(&job),
            token: Arc::clone(&token),
        };
        let span = job_span(&self.subject_id, stage.as_str(), artifact_key);
        let handle = tokio::spawn(task.run().instrument(span));

        if let Some(previous) = jobs.insert(stage, JobEntry { job, token, handle }) {
            previous.stop("replaced");
        }
        info!(subject_id = %self.subject_id, stage = %stage, job = job_name, "Job started");
        true
    }

    /// Stops the stage's job. Returns true if one was running.
    pub fn cancel(&self, stage: S) -> bool {
        let entry = self.jobs.lock().remove(&stage);
        match entry {
            Some(entry) => {
                let was_running = entry.is_running();
                entry.stop("cancelled");
                if was_running {
                    debug!(subject_id = %self.subject_id, stage = %stage, "Job cancelled");
                }
                was_running
            }
            None => false,
        }
    }

    /// Stops every job.
    pub fn cancel_all(&self) {
        let entries: Vec<JobEntry<S>> = self.jobs.lock().drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            entry.stop("tracker shut down");
        }
    }

    /// Returns true if the stage has a running job.
    #[must_use]
    pub fn is_polling(&self, stage: S) -> bool {
        self.jobs.lock().get(&stage).is_some_and(JobEntry::is_running)
    }

    /// Stages with a running job.
    #[must_use]
    pub fn active_stages(&self) -> Vec<S> {
        let mut stages: Vec<S> = self
            .jobs
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_running())
            .map(|(stage, _)| *stage)
            .collect();
        stages.sort();
        stages
    }

    /// A copy of the stage's most recent job.
    #[must_use]
    pub fn job(&self, stage: S) -> Option<AsyncJob<S>> {
        self.jobs.lock().get(&stage).map(|entry| entry.job.lock().clone())
    }
}

impl<S: StageKey> Drop for AsyncJobTracker<S> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl<S: StageKey> std::fmt::Debug for AsyncJobTracker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncJobTracker")
            .field("subject_id", &self.subject_id)
            .field("poll", &self.poll)
            .field("active", &self.active_stages())
            .finish()
    }
}

struct PollTask<S: StageKey> {
    subject_id: String,
    stage: S,
    artifact_key: String,
    job_name: String,
    lookup: Arc<dyn ArtifactLookup>,
    trigger: Arc<dyn JobTrigger>,
    poll: PollConfig,
    on_signal: SignalHandler<S>,
    job: Arc<Mutex<AsyncJob<S>>>,
    token: Arc<CancellationToken>,
}

impl<S: StageKey> PollTask<S> {
    async fn run(self) {
        let triggered = tokio::select! {
            () = self.token.cancelled() => return,
            result = self.trigger.trigger(&self.job_name, &self.subject_id) => result,
        };
        if let Err(error) = triggered {
            warn!(job = %self.job_name, error = %error, "Job trigger failed");
            self.settle(JobState::Failed, JobSignal::TriggerFailed {
                stage: self.stage,
                job_name: self.job_name.clone(),
                error,
            });
            return;
        }
        self.job.lock().mark_triggered();

        let mut ticker = tokio::time::interval(self.poll.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts: u32 = 0;

        loop {
            tokio::select! {
                () = self.token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            attempts = attempts.saturating_add(1);
            self.job.lock().attempts = attempts;
            let found = tokio::select! {
                () = self.token.cancelled() => return,
                result = self.lookup.find_by_type(&self.subject_id, &self.artifact_key) => result,
            };

            match found {
                Ok(Some(artifact)) => {
                    let elapsed_ms = self.job.lock().elapsed_ms();
                    debug!(artifact_id = %artifact.id, attempts, elapsed_ms, "Artifact found");
                    self.settle(JobState::Found, JobSignal::Found {
                        stage: self.stage,
                        artifact,
                    });
                    return;
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(attempts, error = %error, "Artifact lookup failed; polling continues");
                }
            }

            if self.poll.max_attempts.is_some_and(|max| attempts >= max) {
                info!(attempts, "Artifact polling timed out");
                self.settle(JobState::TimedOut, JobSignal::TimedOut {
                    stage: self.stage,
                    attempts,
                });
                return;
            }
        }
    }

    fn settle(&self, state: JobState, signal: JobSignal<S>) {
        if self.token.is_cancelled() {
            return;
        }
        self.job.lock().settle(state);
        (self.on_signal)(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArtifactRef;
    use crate::ports::{MockArtifactLookup, MockJobTrigger};
    use crate::testing::{RecordingJobTrigger, ScriptedArtifactLookup};
    use std::time::Duration;

    crate::stage_keys! {
        enum Step {
            Contract => "contract",
            Summary => "summary",
        }
    }

    fn collector() -> (SignalHandler<Step>, Arc<Mutex<Vec<JobSignal<Step>>>>) {
        let signals = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&signals);
        (Arc::new(move |signal| sink.lock().push(signal)), signals)
    }

    fn poll() -> PollConfig {
        PollConfig::default().with_interval(Duration::from_secs(4))
    }

    #[tokio::test(start_paused = true)]
    async fn test_found_after_misses_signals_once_and_stops() {
        let lookup = Arc::new(ScriptedArtifactLookup::found_after(
            2,
            ArtifactRef::new("file-9", "contract"),
        ));
        let trigger = Arc::new(RecordingJobTrigger::new());
        let (handler, signals) = collector();
        let tracker = AsyncJobTracker::new("lead-1", lookup.clone(), trigger.clone(), poll(), handler);

        assert!(tracker.start(Step::Contract, "contract", "generate_contract"));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(trigger.calls(), vec![("generate_contract".to_string(), "lead-1".to_string())]);
        assert_eq!(lookup.calls(), 3);
        let signals = signals.lock();
        assert_eq!(signals.len(), 1);
        assert!(matches!(&signals[0], JobSignal::Found { artifact, .. } if artifact.id == "file-9"));
        assert!(!tracker.is_polling(Step::Contract));
        assert_eq!(tracker.job(Step::Contract).map(|j| j.state), Some(JobState::Found));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_noop_while_polling() {
        let lookup = Arc::new(ScriptedArtifactLookup::never());
        let trigger = Arc::new(RecordingJobTrigger::new());
        let (handler, _) = collector();
        let tracker = AsyncJobTracker::new("lead-1", lookup, trigger.clone(), poll(), handler);

        assert!(tracker.start(Step::Contract, "contract", "generate_contract"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!tracker.start(Step::Contract, "contract", "generate_contract"));
        assert_eq!(tracker.active_stages(), vec![Step::Contract]);
        assert_eq!(trigger.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_stages_follow_stage_order() {
        let lookup = Arc::new(ScriptedArtifactLookup::never());
        let trigger = Arc::new(RecordingJobTrigger::new());
        let (handler, _) = collector();
        let tracker = AsyncJobTracker::new("lead-1", lookup, trigger, poll(), handler);

        tracker.start(Step::Summary, "summary", "generate_summary");
        tracker.start(Step::Contract, "contract", "generate_contract");
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(tracker.active_stages(), vec![Step::Contract, Step::Summary]);
        tracker.cancel(Step::Contract);
        assert_eq!(tracker.active_stages(), vec![Step::Summary]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_lookups_and_suppresses_signal() {
        let lookup = Arc::new(ScriptedArtifactLookup::never());
        let trigger = Arc::new(RecordingJobTrigger::new());
        let (handler, signals) = collector();
        let tracker = AsyncJobTracker::new("lead-1", lookup.clone(), trigger, poll(), handler);

        tracker.start(Step::Contract, "contract", "generate_contract");
        tokio::time::sleep(Duration::from_secs(9)).await;
        let before = lookup.calls();
        assert!(before >= 1);

        assert!(tracker.cancel(Step::Contract));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(lookup.calls(), before);
        assert!(signals.lock().is_empty());
        assert!(!tracker.cancel(Step::Contract));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_errors_keep_polling() {
        let lookup = Arc::new(
            ScriptedArtifactLookup::found_after(0, ArtifactRef::new("file-1", "contract")).with_errors(2),
        );
        let trigger = Arc::new(RecordingJobTrigger::new());
        let (handler, signals) = collector();
        let tracker = AsyncJobTracker::new("lead-1", lookup.clone(), trigger, poll(), handler);

        tracker.start(Step::Contract, "contract", "generate_contract");
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(lookup.calls(), 3);
        assert_eq!(signals.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_failure_signals_without_polling() {
        let lookup = Arc::new(ScriptedArtifactLookup::never());
        let trigger = Arc::new(RecordingJobTrigger::failing("job runner down"));
        let (handler, signals) = collector();
        let tracker = AsyncJobTracker::new("lead-1", lookup.clone(), trigger, poll(), handler);

        tracker.start(Step::Contract, "contract", "generate_contract");
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(lookup.calls(), 0);
        let signals = signals.lock();
        assert!(matches!(&signals[0], JobSignal::TriggerFailed { job_name, .. } if job_name == "generate_contract"));
        assert_eq!(tracker.job(Step::Contract).map(|j| j.state), Some(JobState::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_times_out() {
        let lookup = Arc::new(ScriptedArtifactLookup::never());
        let trigger = Arc::new(RecordingJobTrigger::new());
        let (handler, signals) = collector();
        let tracker = AsyncJobTracker::new(
            "lead-1",
            lookup.clone(),
            trigger,
            poll().with_max_attempts(3),
            handler,
        );

        tracker.start(Step::Summary, "summary", "generate_summary");
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(lookup.calls(), 3);
        assert_eq!(
            *signals.lock(),
            vec![JobSignal::TimedOut {
                stage: Step::Summary,
                attempts: 3
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_collaborators_receive_subject_and_keys() {
        let mut trigger = MockJobTrigger::new();
        trigger
            .expect_trigger()
            .withf(|job, subject| job == "generate_summary" && subject == "lead-1")
            .times(1)
            .returning(|_, _| Ok(()));
        let mut lookup = MockArtifactLookup::new();
        lookup
            .expect_find_by_type()
            .withf(|subject, key| subject == "lead-1" && key == "summary")
            .times(1)
            .returning(|_, _| Ok(Some(ArtifactRef::new("sum-1", "summary"))));
        let (handler, signals) = collector();
        let tracker = AsyncJobTracker::new("lead-1", Arc::new(lookup), Arc::new(trigger), poll(), handler);

        tracker.start(Step::Summary, "summary", "generate_summary");
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(signals.lock().len(), 1);
        assert_eq!(tracker.job(Step::Summary).map(|j| j.attempts), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_all_jobs() {
        let lookup = Arc::new(ScriptedArtifactLookup::never());
        let trigger = Arc::new(RecordingJobTrigger::new());
        let (handler, _) = collector();
        let tracker = AsyncJobTracker::new("lead-1", lookup.clone(), trigger, poll(), handler);

        tracker.start(Step::Contract, "contract", "generate_contract");
        tracker.start(Step::Summary, "summary", "generate_summary");
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(tracker);

        let before = lookup.calls();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(lookup.calls(), before);
    }
}
