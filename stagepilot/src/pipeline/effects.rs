//! Transition results: side effects described as data.

use crate::core::{PipelineEvent, StageKey};

/// A write the runtime should send to the stage-data store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite<S: StageKey> {
    /// `set(subject, stage, key, value)`.
    Set {
        /// The stage.
        stage: S,
        /// The stage-data key.
        key: &'static str,
        /// The value.
        value: serde_json::Value,
    },
    /// `delete_all(subject, stage)`.
    DeleteAll {
        /// The stage.
        stage: S,
    },
}

impl<S: StageKey> StoreWrite<S> {
    /// The stage the write belongs to.
    #[must_use]
    pub fn stage(&self) -> S {
        match self {
            Self::Set { stage, .. } | Self::DeleteAll { stage } => *stage,
        }
    }
}

/// Something the runtime must do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect<S: StageKey> {
    /// Trigger the stage's generation job and poll for its artifact.
    StartJob {
        /// The generation stage.
        stage: S,
        /// Artifact key to poll for.
        artifact_key: String,
        /// External job to trigger.
        job_name: String,
    },
    /// Stop polling for the stage.
    CancelJob {
        /// The stage.
        stage: S,
    },
    /// Persist stage data.
    Persist(StoreWrite<S>),
    /// Fire an external job without polling (decision notifications).
    TriggerJob {
        /// The stage that caused it.
        stage: S,
        /// External job to trigger.
        job_name: String,
    },
    /// The pipeline completed for the first time.
    PipelineCompleted,
}

/// The outcome of one transition operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S: StageKey> {
    /// Whether the status map changed.
    pub changed: bool,
    /// Side effects for the runtime, in order.
    pub effects: Vec<Effect<S>>,
    /// Events describing what happened.
    pub events: Vec<PipelineEvent>,
}

impl<S: StageKey> Default for Transition<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StageKey> Transition<S> {
    /// Creates an empty transition.
    #[must_use]
    pub fn new() -> Self {
        Self {
            changed: false,
            effects: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Returns the store writes among the effects.
    pub fn store_writes(&self) -> impl Iterator<Item = &StoreWrite<S>> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Persist(write) => Some(write),
            _ => None,
        })
    }

    /// Returns true if an effect matches `pred`.
    pub fn has_effect(&self, pred: impl Fn(&Effect<S>) -> bool) -> bool {
        self.effects.iter().any(pred)
    }

    /// Returns the event types, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.event_type.as_str()).collect()
    }

    pub(crate) fn push(&mut self, effect: Effect<S>) {
        self.effects.push(effect);
    }

    pub(crate) fn emit(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }

    pub(crate) fn persist_set(&mut self, stage: S, key: &'static str, value: serde_json::Value) {
        self.effects.push(Effect::Persist(StoreWrite::Set { stage, key, value }));
    }

    pub(crate) fn persist_delete(&mut self, stage: S) {
        self.effects.push(Effect::Persist(StoreWrite::DeleteAll { stage }));
    }
}
