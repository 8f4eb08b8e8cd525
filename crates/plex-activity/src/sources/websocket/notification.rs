//! Classify decoded notifications into events
//!
//! Messages are dispatched on their `type` discriminator. A type handler
//! that yields nothing declines the message, which is then emitted as a
//! generic `websocket.notification.<type>` event.

use crate::events::{
    self, Emission, SCANNER_FINISHED, SCANNER_PROGRESS, SCANNER_STARTED, WEBSOCKET_PLAYING,
};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

static SCANNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^Scanning the "(?P<section>.*?)" section"#).expect("scanning pattern is valid")
});

static SCAN_COMPLETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Library scan complete").expect("scan complete pattern is valid")
});

const LEGACY_CONTAINER: &str = "NotificationContainer";
const LEGACY_CHILDREN: &str = "_children";

/// Processing phase of a timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimelineState {
    /// 0
    Created,
    /// 1
    Processing,
    /// 2
    Matching,
    /// 3
    Downloading,
    /// 4
    Loading,
    /// 5
    Finished,
    /// 6
    Analyzing,
    /// 9
    Deleted,
}

impl TimelineState {
    /// Map a wire state code; unmapped codes yield `None`
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Created,
            1 => Self::Processing,
            2 => Self::Matching,
            3 => Self::Downloading,
            4 => Self::Loading,
            5 => Self::Finished,
            6 => Self::Analyzing,
            9 => Self::Deleted,
            _ => return None,
        })
    }

    /// Read the state of an entry, accepting numbers and numeric strings
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Self::from_code(n.as_i64()?),
            Value::String(s) => Self::from_code(s.trim().parse().ok()?),
            _ => None,
        }
    }

    /// Event emitted for entries in this state
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Created => events::TIMELINE_CREATED,
            Self::Processing => events::TIMELINE_PROCESSING,
            Self::Matching => events::TIMELINE_MATCHING,
            Self::Downloading => events::TIMELINE_DOWNLOADING,
            Self::Loading => events::TIMELINE_LOADING,
            Self::Finished => events::TIMELINE_FINISHED,
            Self::Analyzing => events::TIMELINE_ANALYZING,
            Self::Deleted => events::TIMELINE_DELETED,
        }
    }
}

/// Type-specific handler: returns nothing to decline the message
pub type NotificationHandler = fn(&Map<String, Value>) -> Vec<Emission>;

/// Dispatch table from `type` discriminator to handler
#[derive(Debug, Clone)]
pub struct NotificationRouter {
    handlers: HashMap<&'static str, NotificationHandler>,
}

impl Default for NotificationRouter {
    fn default() -> Self {
        let mut handlers: HashMap<&'static str, NotificationHandler> = HashMap::new();
        handlers.insert("playing", playing);
        handlers.insert("progress", progress);
        handlers.insert("status", status);
        handlers.insert("timeline", timeline);
        Self { handlers }
    }
}

impl NotificationRouter {
    /// Router with the built-in handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Discriminators with a dedicated handler
    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Classify a decoded message
    ///
    /// Returns `None` when the message has to be dropped (not a mapping, or
    /// no `type`).
    pub fn route(&self, message: Value) -> Option<Vec<Emission>> {
        let mut info = match message {
            Value::Object(info) => info,
            other => {
                debug!("Received message that is not an object: {}", other);
                return None;
            }
        };

        // Server versions that nest everything one level deeper
        if matches!(info.get(LEGACY_CONTAINER), Some(Value::Object(_))) {
            if let Some(Value::Object(inner)) = info.remove(LEGACY_CONTAINER) {
                info = inner;
            }
        }

        let Some(kind) = info
            .get("type")
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
            .map(str::to_string)
        else {
            debug!("Received message with no \"type\" parameter: {:?}", info);
            return None;
        };

        if let Some(handler) = self.handlers.get(kind.as_str()) {
            let emissions = handler(&info);
            if !emissions.is_empty() {
                return Some(emissions);
            }
        }

        Some(generic(&events::notification_event(&kind), Value::Object(info)))
    }
}

/// Locate a nested child collection
///
/// A sequence is its own children. For a mapping, the legacy `_children`
/// key wins; otherwise the first key ending in `entry` or `notification`
/// (any case) whose value is a sequence.
pub fn find_children(info: &Value) -> Option<&Vec<Value>> {
    match info {
        Value::Array(children) => Some(children),
        Value::Object(map) => {
            if let Some(Value::Array(children)) = map.get(LEGACY_CHILDREN) {
                if !children.is_empty() {
                    return Some(children);
                }
            }

            map.iter().find_map(|(key, value)| {
                let key = key.to_lowercase();
                match value {
                    Value::Array(children)
                        if key.ends_with("entry") || key.ends_with("notification") =>
                    {
                        Some(children)
                    }
                    _ => None,
                }
            })
        }
        _ => None,
    }
}

/// Children of a typed message under the legacy key or `key`
fn children<'a>(info: &'a Map<String, Value>, key: &str) -> Option<&'a Vec<Value>> {
    [LEGACY_CHILDREN, key]
        .into_iter()
        .filter_map(|k| info.get(k).and_then(Value::as_array))
        .find(|children| !children.is_empty())
}

/// Emit every child, or the whole message when it has none
fn generic(name: &str, info: Value) -> Vec<Emission> {
    if let Some(children) = find_children(&info).filter(|c| !c.is_empty()) {
        return children
            .iter()
            .map(|child| Emission::with_payload(name, child.clone()))
            .collect();
    }

    let empty = match &info {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };

    if empty {
        vec![Emission::bare(name)]
    } else {
        vec![Emission::with_payload(name, info)]
    }
}

fn playing(info: &Map<String, Value>) -> Vec<Emission> {
    let Some(children) = children(info, "PlaySessionStateNotification") else {
        debug!("Received \"playing\" message with no children: {:?}", info);
        return Vec::new();
    };

    children
        .iter()
        .map(|child| Emission::with_payload(WEBSOCKET_PLAYING, child.clone()))
        .collect()
}

fn progress(info: &Map<String, Value>) -> Vec<Emission> {
    let Some(children) = children(info, "ProgressNotification") else {
        debug!("Received \"progress\" message with no children: {:?}", info);
        return Vec::new();
    };

    children
        .iter()
        .map(|child| {
            let message = child.get("message").cloned().unwrap_or(Value::Null);
            Emission::with_payload(SCANNER_PROGRESS, json!({ "message": message }))
        })
        .collect()
}

fn status(info: &Map<String, Value>) -> Vec<Emission> {
    let Some(children) = children(info, "StatusNotification") else {
        debug!("Received \"status\" message with no children: {:?}", info);
        return Vec::new();
    };

    let emissions: Vec<Emission> = children
        .iter()
        .filter_map(|child| {
            let title = child.get("title")?.as_str().filter(|t| !t.is_empty())?;

            if SCAN_COMPLETE.is_match(title) {
                return Some(Emission::bare(SCANNER_FINISHED));
            }

            let section = SCANNING.captures(title)?.name("section")?.as_str();
            (!section.is_empty())
                .then(|| Emission::with_payload(SCANNER_STARTED, json!({ "section": section })))
        })
        .collect();

    if emissions.is_empty() {
        debug!("Received \"status\" message with no valid children: {:?}", info);
    }
    emissions
}

fn timeline(info: &Map<String, Value>) -> Vec<Emission> {
    let Some(children) = children(info, "TimelineEntry") else {
        debug!("Received \"timeline\" message with no children: {:?}", info);
        return Vec::new();
    };

    let emissions: Vec<Emission> = children
        .iter()
        .filter_map(|entry| {
            let state = TimelineState::from_value(entry.get("state")?)?;
            Some(Emission::with_payload(state.event_name(), entry.clone()))
        })
        .collect();

    if emissions.is_empty() {
        debug!("Received \"timeline\" message with no valid children: {:?}", info);
    }
    emissions
}
