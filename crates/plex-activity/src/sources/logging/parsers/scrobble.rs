use super::{LineParser, capture_fields, line_regex};
use crate::events::{ACTION_SCROBBLE, Emission};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static SCROBBLE: LazyLock<Regex> = LazyLock::new(|| {
    line_regex(
        r"Library item (?P<rating_key>\d+) '(?P<title>.*?)' got (?P<action>(?:un)?played) by account (?P<account_key>\d+)!",
        true,
    )
    .expect("scrobble pattern is valid")
});

/// Items marked played or unplayed by an account
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrobbleParser;

impl LineParser for ScrobbleParser {
    fn name(&self) -> &'static str {
        "scrobble"
    }

    fn events(&self) -> &'static [&'static str] {
        &[ACTION_SCROBBLE]
    }

    fn parse(&self, line: &str) -> Option<Emission> {
        let captures = SCROBBLE.captures(line)?;
        let mut payload = capture_fields(&captures, &["rating_key", "title", "action", "account_key"]);

        // Case-insensitive match, normalized action
        if let Some(Value::String(action)) = payload.get_mut("action") {
            *action = action.to_lowercase();
        }

        Some(Emission::with_payload(ACTION_SCROBBLE, Value::Object(payload)))
    }
}
