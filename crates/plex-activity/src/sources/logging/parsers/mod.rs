//! Line parsers for the server activity log
//!
//! Every parser matches the shared log-line template followed by its own
//! message pattern. A [`ParserChain`] tries its parsers in order and stops at
//! the first one that claims the line.

mod now_playing;
mod scrobble;

pub use now_playing::NowPlayingParser;
pub use scrobble::ScrobbleParser;

use crate::events::Emission;
use event_pipe::EventPipe;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::trace;

/// Prefix shared by every server log line; `{message}` is replaced by the
/// parser-specific message pattern
pub const LOG_PATTERN: &str = r"^(?P<timestamp>[A-Za-z]{3} \d{1,2}, \d{4} \d{2}:\d{2}:\d{2}(?:\.\d+)?) \[(?P<thread>[0-9A-Fa-fx]+)\] (?P<level>[A-Z]+) - (?:\[(?P<module>[^\]]+)\] )?{message}";

/// Build a parser pattern from the shared template
pub fn line_regex(message: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    let pattern = LOG_PATTERN.replace("{message}", message);

    if case_insensitive {
        Regex::new(&format!("(?i){}", pattern))
    } else {
        Regex::new(&pattern)
    }
}

/// Copy named capture groups into a payload mapping
pub(crate) fn capture_fields(captures: &Captures<'_>, names: &[&str]) -> Map<String, Value> {
    names
        .iter()
        .filter_map(|name| {
            captures
                .name(name)
                .map(|m| (name.to_string(), Value::String(m.as_str().to_string())))
        })
        .collect()
}

/// A matcher that turns one kind of log line into an event
pub trait LineParser: Send + Sync {
    /// Parser name used in log output
    fn name(&self) -> &'static str;

    /// Event names this parser may emit
    fn events(&self) -> &'static [&'static str];

    /// Classify a line, returning the event to emit if the line is claimed
    fn parse(&self, line: &str) -> Option<Emission>;
}

/// Ordered, immutable list of parsers
pub struct ParserChain {
    parsers: Vec<Box<dyn LineParser>>,
}

impl ParserChain {
    /// Create a chain trying `parsers` in the given order
    pub fn new(parsers: Vec<Box<dyn LineParser>>) -> Self {
        Self { parsers }
    }

    /// Parser names in order
    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    /// Every event name the chain may emit, without duplicates
    pub fn event_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for name in self.parsers.iter().flat_map(|p| p.events().iter().copied()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Classify a line with the first parser that claims it
    pub fn parse(&self, line: &str) -> Option<Emission> {
        self.parsers.iter().find_map(|parser| {
            let emission = parser.parse(line)?;
            trace!("Line claimed by {} parser", parser.name());
            Some(emission)
        })
    }

    /// Classify a line and emit the result into `pipe`
    ///
    /// Returns whether any parser claimed the line.
    pub fn process(&self, line: &str, pipe: &EventPipe) -> bool {
        match self.parse(line) {
            Some(emission) => {
                pipe.emit(&emission.into_event());
                true
            }
            None => false,
        }
    }
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::new(vec![Box::new(NowPlayingParser), Box::new(ScrobbleParser)])
    }
}

impl std::fmt::Debug for ParserChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserChain")
            .field("parsers", &self.names())
            .finish()
    }
}
