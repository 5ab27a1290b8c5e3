//! iCalendar (RFC 5545) → [`RawEvent`].
//!
//! Only `VEVENT`s are read. Values are handed over as the feed wrote them
//! apart from text unescaping; dates are interpreted later by the normalizer.

use std::io::BufRead;

use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use pdufa_core::{RawEvent, RawStart};
use tracing::debug;

use crate::FeedError;

/// Parse every calendar in `reader`.
///
/// Events are tagged with the calendar's `X-WR-CALNAME`, or with `feed` when
/// the calendar has no name. `feed` also labels parse errors.
pub fn parse_calendar<R: BufRead>(reader: R, feed: &str) -> Result<Vec<RawEvent>, FeedError> {
    let mut events = Vec::new();
    for calendar in ical::IcalParser::new(reader) {
        let calendar = calendar.map_err(|e| FeedError::Parse {
            feed: feed.to_string(),
            message: e.to_string(),
        })?;

        let name = calendar
            .properties
            .iter()
            .find(|p| p.name == "X-WR-CALNAME" || p.name == "NAME")
            .and_then(|p| p.value.as_deref())
            .map(unescape)
            .filter(|n| !n.trim().is_empty());
        let source = name.unwrap_or_else(|| feed.to_string());

        events.extend(calendar.events.iter().map(|event| to_raw_event(event, &source)));
    }
    debug!(feed, count = events.len(), "parsed calendar");
    Ok(events)
}

pub fn parse_calendar_str(text: &str, feed: &str) -> Result<Vec<RawEvent>, FeedError> {
    parse_calendar(text.as_bytes(), feed)
}

fn to_raw_event(event: &IcalEvent, source: &str) -> RawEvent {
    let mut raw = RawEvent {
        uid: None,
        summary: String::new(),
        description: None,
        start: None,
        source_feed: source.to_string(),
    };

    for property in &event.properties {
        match property.name.as_str() {
            "SUMMARY" => {
                raw.summary = property.value.as_deref().map(unescape).unwrap_or_default();
            }
            "DESCRIPTION" => {
                raw.description = property.value.as_deref().map(unescape);
            }
            "UID" => {
                raw.uid.clone_from(&property.value);
            }
            "DTSTART" => {
                raw.start = property.value.as_ref().map(|value| RawStart {
                    value: value.clone(),
                    tzid: param(property, "TZID"),
                });
            }
            _ => {}
        }
    }
    raw
}

fn param(property: &Property, name: &str) -> Option<String> {
    property
        .params
        .iter()
        .flatten()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|v| v.trim_matches('"').to_string())
}

/// Undo RFC 5545 text escaping (`\n`, `\,`, `\;`, `\\`).
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
