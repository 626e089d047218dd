//! Event types for the screening session
//!
//! Provides the screening event definitions and the EventBus that front ends
//! subscribe to for user-visible notices and progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Screening session events
///
/// Events are broadcast via EventBus and serialize with a `type` tag so they
/// can be forwarded as JSON lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ScreeningEvent {
    /// An image passed intake and its preview is ready
    ImageSelected {
        session_id: Uuid,
        filename: String,
        mime_type: String,
        size_bytes: u64,
        timestamp: DateTime<Utc>,
    },

    /// An image failed intake; the previous selection is untouched
    ImageRejected {
        session_id: Uuid,
        filename: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Image, preview and result were cleared
    ImageRemoved {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Classify call sent
    PredictionStarted {
        session_id: Uuid,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Classify call succeeded and its result was applied
    PredictionCompleted {
        session_id: Uuid,
        generation: u64,
        prediction: String,
        top_confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// Classify call failed
    PredictionFailed {
        session_id: Uuid,
        generation: u64,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Report written to disk
    ReportSaved {
        session_id: Uuid,
        path: PathBuf,
        size_bytes: u64,
        timestamp: DateTime<Utc>,
    },

    /// Report generation or saving failed
    ReportFailed {
        session_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A response arrived after the image it belonged to was removed or replaced
    ResponseDiscarded {
        session_id: Uuid,
        generation: u64,
        current_generation: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ScreeningEvent {
    /// Event name, matching the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            ScreeningEvent::ImageSelected { .. } => "ImageSelected",
            ScreeningEvent::ImageRejected { .. } => "ImageRejected",
            ScreeningEvent::ImageRemoved { .. } => "ImageRemoved",
            ScreeningEvent::PredictionStarted { .. } => "PredictionStarted",
            ScreeningEvent::PredictionCompleted { .. } => "PredictionCompleted",
            ScreeningEvent::PredictionFailed { .. } => "PredictionFailed",
            ScreeningEvent::ReportSaved { .. } => "ReportSaved",
            ScreeningEvent::ReportFailed { .. } => "ReportFailed",
            ScreeningEvent::ResponseDiscarded { .. } => "ResponseDiscarded",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            ScreeningEvent::ImageSelected { session_id, .. }
            | ScreeningEvent::ImageRejected { session_id, .. }
            | ScreeningEvent::ImageRemoved { session_id, .. }
            | ScreeningEvent::PredictionStarted { session_id, .. }
            | ScreeningEvent::PredictionCompleted { session_id, .. }
            | ScreeningEvent::PredictionFailed { session_id, .. }
            | ScreeningEvent::ReportSaved { session_id, .. }
            | ScreeningEvent::ReportFailed { session_id, .. }
            | ScreeningEvent::ResponseDiscarded { session_id, .. } => *session_id,
        }
    }
}

/// Event distribution bus backed by `tokio::sync::broadcast`
///
/// Publishing never blocks; slow subscribers observe `Lagged` instead of
/// holding back the session.
///
/// # Examples
///
/// ```
/// use vxaid_common::events::{EventBus, ScreeningEvent};
///
/// let event_bus = EventBus::new(16);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ScreeningEvent::ImageRemoved {
///     session_id: uuid::Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "ImageRemoved");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScreeningEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScreeningEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ScreeningEvent,
    ) -> Result<usize, broadcast::error::SendError<ScreeningEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScreeningEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
