//! Collaborator interfaces the engine depends on.
//!
//! The engine never talks to a database, a file service or a job runner
//! directly. It persists through [`StageDataStore`], discovers generated
//! files through [`ArtifactLookup`], fires external jobs through
//! [`JobTrigger`] and reports completion through [`CompletionListener`].

mod artifacts;
mod completion;
mod store;
mod trigger;
#[cfg(feature = "webhook")]
mod webhook;

pub use artifacts::ArtifactLookup;
pub use completion::{CompletionListener, NoOpCompletionListener};
pub use store::{keys, InMemoryStageDataStore, StageDataStore};
pub use trigger::{JobTrigger, NoOpJobTrigger};
#[cfg(feature = "webhook")]
pub use webhook::WebhookJobTrigger;

#[cfg(test)]
pub use artifacts::MockArtifactLookup;
#[cfg(test)]
pub use trigger::MockJobTrigger;
#[cfg(test)]
pub use store::MockStageDataStore;
