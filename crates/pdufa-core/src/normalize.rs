//! Raw calendar event → [`NormalizedEvent`].
//!
//! Events with no usable start date or an empty summary are rejected with a
//! [`DropReason`]; the caller counts and logs them, nothing here fails a run.
//!
//! # Date-times
//!
//! Date-only starts are used as-is. For date-times the [`DateTimePolicy`]
//! decides whether a zoned value keeps the calendar day written in the feed
//! (`FeedNative`) or is first converted into the configured zone (`Convert`).
//! Floating date-times (no `Z`, offset or `TZID`) keep their written day
//! under both policies.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::{NormalizedEvent, RawEvent, RawStart};

/// How a zoned date-time is truncated to a calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimePolicy {
    /// Keep the date components exactly as the feed wrote them.
    #[default]
    FeedNative,
    /// Convert into the configured zone, then truncate.
    Convert,
}

/// Why an event never reached the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingStart,
    UnparseableStart(String),
    EmptySummary,
}

/// Start value after parsing, before a calendar day is picked.
#[derive(Debug, Clone, PartialEq)]
enum ParsedStart {
    Date(NaiveDate),
    Floating(NaiveDateTime),
    Fixed(DateTime<FixedOffset>),
    Named(NaiveDateTime, Tz),
}

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d"];
const FLOATING_FORMATS: &[&str] = &[
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];
const UTC_FORMATS: &[&str] = &["%Y%m%dT%H%M%SZ", "%Y%m%dT%H%MZ"];

pub struct Normalizer {
    timezone: Tz,
    policy: DateTimePolicy,
}

impl Normalizer {
    pub fn new(timezone: Tz, policy: DateTimePolicy) -> Self {
        Self { timezone, policy }
    }

    pub fn normalize(&self, raw: &RawEvent) -> Result<NormalizedEvent, DropReason> {
        let summary_text = collapse_whitespace(&raw.summary);
        if summary_text.is_empty() {
            return Err(DropReason::EmptySummary);
        }

        let start = raw.start.as_ref().ok_or(DropReason::MissingStart)?;
        let parsed = parse_start(start)
            .ok_or_else(|| DropReason::UnparseableStart(start.value.clone()))?;
        let decision_date = self.decision_date(&parsed);

        Ok(NormalizedEvent {
            uid: raw.uid.clone().filter(|u| !u.trim().is_empty()),
            summary_text,
            body_text: raw
                .description
                .as_deref()
                .map(collapse_whitespace)
                .unwrap_or_default(),
            decision_date,
            source_feed: raw.source_feed.trim().to_string(),
            timezone: self.timezone.name().to_string(),
        })
    }

    fn decision_date(&self, parsed: &ParsedStart) -> NaiveDate {
        match (parsed, self.policy) {
            (ParsedStart::Date(date), _) => *date,
            (ParsedStart::Floating(naive), _) => naive.date(),
            (ParsedStart::Fixed(dt), DateTimePolicy::FeedNative) => dt.date_naive(),
            (ParsedStart::Fixed(dt), DateTimePolicy::Convert) => {
                dt.with_timezone(&self.timezone).date_naive()
            }
            (ParsedStart::Named(naive, _), DateTimePolicy::FeedNative) => naive.date(),
            (ParsedStart::Named(naive, zone), DateTimePolicy::Convert) => zone
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.with_timezone(&self.timezone).date_naive())
                // Local time falls in a DST gap; keep the written day.
                .unwrap_or_else(|| naive.date()),
        }
    }
}

/// Trim and collapse runs of whitespace to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_start(start: &RawStart) -> Option<ParsedStart> {
    let value = start.value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
    {
        return Some(ParsedStart::Date(date));
    }

    if let Some(naive) = UTC_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Some(ParsedStart::Fixed(naive.and_utc().fixed_offset()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(ParsedStart::Fixed(dt));
    }

    let naive = FLOATING_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())?;

    match start.tzid.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(tzid) => match tzid.parse::<Tz>() {
            Ok(zone) => Some(ParsedStart::Named(naive, zone)),
            Err(_) => {
                debug!(tzid, "unrecognised TZID, treating start as floating");
                Some(ParsedStart::Floating(naive))
            }
        },
        None => Some(ParsedStart::Floating(naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(summary: &str, start: Option<RawStart>) -> RawEvent {
        RawEvent {
            uid: Some("uid-1@feed".into()),
            summary: summary.into(),
            description: None,
            start,
            source_feed: "  FDA Tracker ".into(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn native() -> Normalizer {
        Normalizer::new(chrono_tz::America::New_York, DateTimePolicy::FeedNative)
    }

    fn converting() -> Normalizer {
        Normalizer::new(chrono_tz::America::New_York, DateTimePolicy::Convert)
    }

    #[test]
    fn date_only_start_passes_through() {
        let ev = native()
            .normalize(&raw("Acme PDUFA", Some(RawStart::new("20250314"))))
            .unwrap();
        assert_eq!(ev.decision_date, ymd(2025, 3, 14));
        assert_eq!(ev.source_feed, "FDA Tracker");
        assert_eq!(ev.timezone, "America/New_York");
    }

    #[test]
    fn iso_date_start() {
        let ev = native()
            .normalize(&raw("Acme PDUFA", Some(RawStart::new("2025-03-14"))))
            .unwrap();
        assert_eq!(ev.decision_date, ymd(2025, 3, 14));
    }

    #[test]
    fn whitespace_is_collapsed_and_missing_description_is_empty() {
        let ev = native()
            .normalize(&raw(
                "  Acme   Pharma \n (ACME)\tPDUFA ",
                Some(RawStart::new("20250314")),
            ))
            .unwrap();
        assert_eq!(ev.summary_text, "Acme Pharma (ACME) PDUFA");
        assert_eq!(ev.body_text, "");
    }

    #[test]
    fn description_is_collapsed() {
        let mut event = raw("Acme PDUFA", Some(RawStart::new("20250314")));
        event.description = Some("Drugzol\n\n  for migraine ".into());
        let ev = native().normalize(&event).unwrap();
        assert_eq!(ev.body_text, "Drugzol for migraine");
    }

    #[test]
    fn missing_start_is_dropped() {
        let result = native().normalize(&raw("Acme PDUFA", None));
        assert_eq!(result.unwrap_err(), DropReason::MissingStart);
    }

    #[test]
    fn garbage_start_is_dropped() {
        let result = native().normalize(&raw("Acme PDUFA", Some(RawStart::new("Q1 2025"))));
        assert!(matches!(result, Err(DropReason::UnparseableStart(v)) if v == "Q1 2025"));
    }

    #[test]
    fn empty_summary_is_dropped() {
        let result = native().normalize(&raw("   ", Some(RawStart::new("20250314"))));
        assert_eq!(result.unwrap_err(), DropReason::EmptySummary);
    }

    #[test]
    fn utc_datetime_keeps_feed_day_by_default() {
        // 02:00 UTC is still the evening of the 13th in New York.
        let ev = native()
            .normalize(&raw("Acme PDUFA", Some(RawStart::new("20250314T020000Z"))))
            .unwrap();
        assert_eq!(ev.decision_date, ymd(2025, 3, 14));
    }

    #[test]
    fn utc_datetime_converted_when_configured() {
        let ev = converting()
            .normalize(&raw("Acme PDUFA", Some(RawStart::new("20250314T020000Z"))))
            .unwrap();
        assert_eq!(ev.decision_date, ymd(2025, 3, 13));
    }

    #[test]
    fn rfc3339_offset_converted_when_configured() {
        let start = RawStart::new("2025-03-14T23:30:00-08:00");
        let kept = native().normalize(&raw("Acme PDUFA", Some(start.clone()))).unwrap();
        assert_eq!(kept.decision_date, ymd(2025, 3, 14));
        let converted = converting().normalize(&raw("Acme PDUFA", Some(start))).unwrap();
        assert_eq!(converted.decision_date, ymd(2025, 3, 15));
    }

    #[test]
    fn tzid_datetime_converted_when_configured() {
        let start = RawStart::new("20250314T230000").with_tzid("America/Los_Angeles");
        let kept = native().normalize(&raw("Acme PDUFA", Some(start.clone()))).unwrap();
        assert_eq!(kept.decision_date, ymd(2025, 3, 14));
        let converted = converting().normalize(&raw("Acme PDUFA", Some(start))).unwrap();
        assert_eq!(converted.decision_date, ymd(2025, 3, 15));
    }

    #[test]
    fn floating_datetime_never_shifts() {
        let ev = converting()
            .normalize(&raw("Acme PDUFA", Some(RawStart::new("20250314T235900"))))
            .unwrap();
        assert_eq!(ev.decision_date, ymd(2025, 3, 14));
    }

    #[test]
    fn unknown_tzid_is_treated_as_floating() {
        let start = RawStart::new("20250314T235900").with_tzid("Mars/Olympus_Mons");
        let ev = converting().normalize(&raw("Acme PDUFA", Some(start))).unwrap();
        assert_eq!(ev.decision_date, ymd(2025, 3, 14));
    }

    #[test]
    fn blank_uid_becomes_none() {
        let mut event = raw("Acme PDUFA", Some(RawStart::new("20250314")));
        event.uid = Some("  ".into());
        assert!(native().normalize(&event).unwrap().uid.is_none());
    }
}
