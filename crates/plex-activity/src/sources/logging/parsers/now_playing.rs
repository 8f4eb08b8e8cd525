use super::{LineParser, capture_fields, line_regex};
use crate::events::{Emission, LOGGING_PLAYING};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TIMELINE_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    line_regex(
        r"Request: (?:\[(?P<address>[^\]\s]+):(?P<port>\d+)[^\]]*\] )?(?P<method>[A-Z]+) /:/timeline\?(?P<query>\S*)",
        false,
    )
    .expect("timeline request pattern is valid")
});

/// Client timeline reports (now playing)
#[derive(Debug, Clone, Copy, Default)]
pub struct NowPlayingParser;

impl LineParser for NowPlayingParser {
    fn name(&self) -> &'static str {
        "now_playing"
    }

    fn events(&self) -> &'static [&'static str] {
        &[LOGGING_PLAYING]
    }

    fn parse(&self, line: &str) -> Option<Emission> {
        let captures = TIMELINE_REQUEST.captures(line)?;

        let mut payload = capture_fields(&captures, &["address", "port", "method"]);
        let query = captures.name("query").map_or("", |m| m.as_str());

        for (key, value) in parse_query(query) {
            payload.entry(key).or_insert(Value::String(value));
        }

        if let Some(rating_key) = payload.get("ratingKey").cloned() {
            payload.insert("rating_key".to_string(), rating_key);
        }

        Some(Emission::with_payload(LOGGING_PLAYING, Value::Object(payload)))
    }
}

/// Decode `key=value&...` pairs, skipping empty keys
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(key);
            (!key.is_empty()).then(|| (key, decode(value)))
        })
        .collect()
}

fn decode(component: &str) -> String {
    let component = component.replace('+', " ");
    match urlencoding::decode(&component) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => component,
    }
}
