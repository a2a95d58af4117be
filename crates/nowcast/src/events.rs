//! Typed events for the UI collaborator.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Closed set of events the nowcast core emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NowcastEvent {
    /// Playback left the primary layer and showed the first frame.
    PlaybackStarted,

    /// Playback ran off the end of the sequence; primary layer restored.
    PlaybackFinished,

    /// The visible frame changed.
    FrameAdvanced { timestamp: DateTime<Utc> },

    /// Downloaded forecast state was discarded (new primary tile-set, or
    /// end of playback).
    ForecastInvalidated,

    /// Coarse ready/loading flag for UI feedback.
    ForecastReady { ready: bool },

    /// A capability or forecast description fetch failed. The client
    /// stays in its last good state; no retry is attempted.
    FetchFailed { url: String, message: String },
}

/// Broadcast fan-out of [`NowcastEvent`]s to any number of subscribers.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<NowcastEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NowcastEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: NowcastEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
