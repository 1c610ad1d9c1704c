//! Event sinks.
//!
//! Every transition returns its events; the runtime forwards them, along
//! with swallowed external failures, to an [`EventSink`]. A process-wide
//! default sink can be installed for drivers built without one.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the process-wide default event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the process-wide default event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the process-wide default event sink.
///
/// Returns a `NoOpEventSink` if none is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineEvent;

    #[tokio::test]
    async fn test_global_sink_round_trip() {
        let collecting = Arc::new(CollectingEventSink::new());
        set_event_sink(collecting.clone());
        get_event_sink().try_emit(PipelineEvent::pipeline_completed());
        clear_event_sink();

        assert_eq!(collecting.len(), 1);
        get_event_sink().try_emit(PipelineEvent::pipeline_completed());
        assert_eq!(collecting.len(), 1);
    }
}
