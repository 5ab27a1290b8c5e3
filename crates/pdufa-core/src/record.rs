//! Ledger record types shared by the extractor, the merger and the stores.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::ParseDecisionTypeError;

/// Marker for a text field the extractor could not populate.
pub const UNKNOWN: &str = "unknown";

/// Separator between accumulated `notes` segments.
pub const NOTE_SEPARATOR: &str = "; ";

/// Separator between accumulated `source` entries.
///
/// A feed label containing it is percent-encoded by [`source_label`].
pub const SOURCE_SEPARATOR: &str = ",";

/// Feed label as a single `source` entry.
///
/// "https://x/cal.ics?a=1,2" → "https://x/cal.ics?a=1%2C2"
pub fn source_label(feed: &str) -> String {
    let feed = feed.trim();
    if feed.is_empty() {
        UNKNOWN.to_string()
    } else {
        feed.replace(SOURCE_SEPARATOR, "%2C")
    }
}

/// Ledger columns in persisted order.
pub const COLUMNS: [&str; 10] = [
    "date_pdufa",
    "company",
    "ticker",
    "drug",
    "indication",
    "priority_review",
    "decision_type",
    "source",
    "announced_at",
    "notes",
];

/// Regulatory review pathway of a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
    Standard,
    Priority,
    Accelerated,
    #[default]
    Unknown,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Priority => "priority",
            Self::Accelerated => "accelerated",
            Self::Unknown => UNKNOWN,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionType {
    type Err = ParseDecisionTypeError;

    /// Case-insensitive; an empty cell reads as `unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "priority" => Ok(Self::Priority),
            "accelerated" => Ok(Self::Accelerated),
            "unknown" | "" => Ok(Self::Unknown),
            _ => Err(ParseDecisionTypeError(s.to_string())),
        }
    }
}

/// One regulatory decision as produced by the extractor.
///
/// Text fields hold either a value or the literal [`UNKNOWN`]; they are never
/// left empty by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    pub date_pdufa: NaiveDate,
    pub company: String,
    pub ticker: String,
    pub drug: String,
    pub indication: String,
    pub priority_review: bool,
    pub decision_type: DecisionType,
    /// Originating feed(s), comma-joined once merged.
    pub source: String,
    /// When this record was first extracted. Never updated by a merge.
    pub announced_at: DateTime<FixedOffset>,
    pub notes: String,
}

/// Persisted form of an [`ExtractedRecord`].
///
/// The ledger carries exactly the extractor's columns; once written, any of
/// them may have been edited by hand.
pub type LedgerRow = ExtractedRecord;

impl ExtractedRecord {
    /// Field access by column name, rendered exactly as the ledger persists it.
    ///
    /// Returns `None` for a name that is not one of [`COLUMNS`].
    pub fn field(&self, column: &str) -> Option<String> {
        let value = match column {
            "date_pdufa" => format_date(self.date_pdufa),
            "company" => self.company.clone(),
            "ticker" => self.ticker.clone(),
            "drug" => self.drug.clone(),
            "indication" => self.indication.clone(),
            "priority_review" => self.priority_review.to_string(),
            "decision_type" => self.decision_type.to_string(),
            "source" => self.source.clone(),
            "announced_at" => format_timestamp(&self.announced_at),
            "notes" => self.notes.clone(),
            _ => return None,
        };
        Some(value)
    }

    /// Non-empty `notes` segments in order.
    pub fn note_segments(&self) -> impl Iterator<Item = &str> {
        split_segments(&self.notes, NOTE_SEPARATOR)
    }

    /// Non-empty `source` entries in order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        split_segments(&self.source, SOURCE_SEPARATOR)
    }
}

/// True for an empty cell or the [`UNKNOWN`] marker (any case).
pub fn is_unknown(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(UNKNOWN)
}

/// `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// RFC 3339 with the offset spelled out (`2025-03-01T09:00:00-05:00`).
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

pub(crate) fn split_segments<'a>(value: &'a str, sep: &str) -> impl Iterator<Item = &'a str> {
    let sep = sep.trim();
    value.split(sep).map(str::trim).filter(|s| !s.is_empty())
}
