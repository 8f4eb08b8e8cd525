//! Event names emitted by the activity sources

use event_pipe::Event;
use serde_json::Value;

/// A session started, paused, resumed or stopped playback
pub const WEBSOCKET_PLAYING: &str = "websocket.playing";
/// A library section scan started
pub const SCANNER_STARTED: &str = "websocket.scanner.started";
/// A library scan reported progress
pub const SCANNER_PROGRESS: &str = "websocket.scanner.progress";
/// A library scan completed
pub const SCANNER_FINISHED: &str = "websocket.scanner.finished";

/// Timeline entry was created
pub const TIMELINE_CREATED: &str = "websocket.timeline.created";
/// Timeline entry is being processed
pub const TIMELINE_PROCESSING: &str = "websocket.timeline.processing";
/// Timeline entry is being matched
pub const TIMELINE_MATCHING: &str = "websocket.timeline.matching";
/// Timeline entry metadata is downloading
pub const TIMELINE_DOWNLOADING: &str = "websocket.timeline.downloading";
/// Timeline entry is loading
pub const TIMELINE_LOADING: &str = "websocket.timeline.loading";
/// Timeline entry finished processing
pub const TIMELINE_FINISHED: &str = "websocket.timeline.finished";
/// Timeline entry media is being analyzed
pub const TIMELINE_ANALYZING: &str = "websocket.timeline.analyzing";
/// Timeline entry was deleted
pub const TIMELINE_DELETED: &str = "websocket.timeline.deleted";

/// Prefix of the generic, type-qualified fallback events
pub const NOTIFICATION_PREFIX: &str = "websocket.notification.";

/// Now-playing request seen in the server log
pub const LOGGING_PLAYING: &str = "logging.playing";
/// An item was marked played or unplayed
pub const ACTION_SCROBBLE: &str = "action.scrobble";

/// Names the notification socket source may emit
pub const WEBSOCKET_EVENTS: &[&str] = &[
    WEBSOCKET_PLAYING,
    SCANNER_STARTED,
    SCANNER_PROGRESS,
    SCANNER_FINISHED,
    TIMELINE_CREATED,
    TIMELINE_PROCESSING,
    TIMELINE_MATCHING,
    TIMELINE_DOWNLOADING,
    TIMELINE_LOADING,
    TIMELINE_FINISHED,
    TIMELINE_ANALYZING,
    TIMELINE_DELETED,
    "websocket.notification.*",
];

/// Names the log tailing source may emit
pub const LOGGING_EVENTS: &[&str] = &[ACTION_SCROBBLE, LOGGING_PLAYING];

/// Name of the fallback event for a notification type
pub fn notification_event(kind: &str) -> String {
    format!("{}{}", NOTIFICATION_PREFIX, kind)
}

/// A classified input waiting to be published
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    /// Event name
    pub name: String,
    /// Event payload
    pub payload: Option<Value>,
}

impl Emission {
    /// Emission without payload
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    /// Emission carrying a payload
    pub fn with_payload(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload: Some(payload),
        }
    }

    /// Stamp the emission into an event
    pub fn into_event(self) -> Event {
        match self.payload {
            Some(payload) => Event::with_payload(self.name, payload),
            None => Event::new(self.name),
        }
    }
}
