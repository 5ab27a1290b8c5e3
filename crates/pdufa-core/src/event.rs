//! Calendar event shapes on either side of the normalizer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Feed-native start value of an event.
///
/// `value` is kept as the feed wrote it (`20250314`, `20250314T090000Z`,
/// `2025-03-14T09:00:00-04:00`, ...). `tzid` carries an iCalendar `TZID`
/// parameter when one was present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStartRepr")]
pub struct RawStart {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tzid: Option<String>,
}

impl RawStart {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            tzid: None,
        }
    }

    pub fn with_tzid(mut self, tzid: impl Into<String>) -> Self {
        self.tzid = Some(tzid.into());
        self
    }
}

/// JSON event lists may give `start` as a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawStartRepr {
    Plain(String),
    Full {
        value: String,
        #[serde(default)]
        tzid: Option<String>,
    },
}

impl From<RawStartRepr> for RawStart {
    fn from(repr: RawStartRepr) -> Self {
        match repr {
            RawStartRepr::Plain(value) => Self { value, tzid: None },
            RawStartRepr::Full { value, tzid } => Self { value, tzid },
        }
    }
}

/// A calendar event as handed over by a feed parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<RawStart>,
    pub source_feed: String,
}

/// Canonical event handed to the extractor.
///
/// `decision_date` is always present: events without a usable date never
/// get this far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub uid: Option<String>,
    pub summary_text: String,
    pub body_text: String,
    pub decision_date: NaiveDate,
    pub source_feed: String,
    /// IANA name of the configured zone the date was resolved under.
    pub timezone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_event_accepts_plain_start_string() {
        let json = r#"{
            "summary": "Acme Pharma (ACME) PDUFA",
            "start": "2025-03-14",
            "source_feed": "fda-tracker"
        }"#;
        let ev: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.start, Some(RawStart::new("2025-03-14")));
        assert!(ev.description.is_none());
        assert!(ev.uid.is_none());
    }

    #[test]
    fn raw_event_accepts_start_with_tzid() {
        let json = r#"{
            "uid": "abc@feed",
            "summary": "Acme PDUFA",
            "start": {"value": "20250314T090000", "tzid": "America/New_York"},
            "source_feed": "fda-tracker"
        }"#;
        let ev: RawEvent = serde_json::from_str(json).unwrap();
        let start = ev.start.unwrap();
        assert_eq!(start.value, "20250314T090000");
        assert_eq!(start.tzid.as_deref(), Some("America/New_York"));
    }

    #[test]
    fn raw_event_without_start_deserializes() {
        let json = r#"{"summary": "TBD", "source_feed": "x"}"#;
        let ev: RawEvent = serde_json::from_str(json).unwrap();
        assert!(ev.start.is_none());
    }
}
