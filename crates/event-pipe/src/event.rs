//! Normalized events and the names they are published under

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized activity fact
///
/// Events are immutable once created. Forwarding an event through a chain of
/// pipes hands every subscriber the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Dot-delimited hierarchical name, e.g. `websocket.timeline.finished`
    pub name: String,
    /// Structured payload: a mapping, a sequence of mappings, or nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// When the source classified the raw input
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event without a payload
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    /// Create an event carrying a payload
    pub fn with_payload(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload: Some(payload),
            timestamp: Utc::now(),
        }
    }

    /// Look up a string field of a mapping payload
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}

/// A declared event name
///
/// Either an exact name or a trailing wildcard (`websocket.notification.*`)
/// standing for every name that extends the prefix. A lone `*` matches
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventPattern {
    /// Matches one name
    Exact(String),
    /// Matches any name strictly longer than, and starting with, the prefix
    Prefix(String),
}

impl EventPattern {
    /// Parse a pattern, treating a trailing `*` as a wildcard
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    /// Check whether `name` is matched by this pattern
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Prefix(prefix) => name.len() > prefix.len() && name.starts_with(prefix.as_str()),
        }
    }

    /// Check whether every name matched by `other` is also matched by this pattern
    pub fn covers(&self, other: &EventPattern) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Exact(_), Self::Prefix(_)) => false,
            (Self::Prefix(_), Self::Exact(name)) => self.matches(name),
            (Self::Prefix(a), Self::Prefix(b)) => b.starts_with(a.as_str()),
        }
    }

    /// Check whether the two patterns can match a common name
    pub fn overlaps(&self, other: &EventPattern) -> bool {
        self.covers(other) || other.covers(self)
    }
}

impl From<&str> for EventPattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

impl From<String> for EventPattern {
    fn from(pattern: String) -> Self {
        Self::parse(&pattern)
    }
}

impl From<&String> for EventPattern {
    fn from(pattern: &String) -> Self {
        Self::parse(pattern)
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => f.write_str(name),
            Self::Prefix(prefix) => write!(f, "{}*", prefix),
        }
    }
}
