//! Identity keys for ledger rows.
//!
//! A key pairs the decision date with a normalised *basis* so that the same
//! real-world decision maps to the same row run after run:
//!
//! - `drug:<name>` when the extractor found a drug,
//! - `summary:<text>` otherwise,
//! - `row:<digest>` for rows nobody extracted (hand-added to the ledger).
//!
//! # Persistence
//!
//! The ledger has no key column and does not store event summaries, so the
//! extractor writes the key into the row's notes as a `key=<basis>` segment.
//! A record with a drug also records its summary key, so an event whose drug
//! shows up or disappears between runs still finds its row.
//! On load every such segment, plus the drug key of a row with a known drug,
//! makes the row reachable. A human correcting `drug` later therefore does
//! not orphan the row from its original extraction.

use std::fmt;

use chrono::NaiveDate;

use crate::record::{LedgerRow, format_date, is_unknown};

/// Prefix of the notes segment that records a row's identity key.
pub const KEY_NOTE_PREFIX: &str = "key=";

const DRUG: &str = "drug:";
const SUMMARY: &str = "summary:";
const ROW: &str = "row:";

/// `(date_pdufa, basis)`. Orders by date, then basis, which matches ordering
/// by the rendered key string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    date_pdufa: NaiveDate,
    basis: String,
}

impl IdentityKey {
    pub fn from_drug(date_pdufa: NaiveDate, drug: &str) -> Self {
        Self {
            date_pdufa,
            basis: format!("{DRUG}{}", normalize_text(drug)),
        }
    }

    pub fn from_summary(date_pdufa: NaiveDate, summary: &str) -> Self {
        Self {
            date_pdufa,
            basis: format!("{SUMMARY}{}", normalize_text(summary)),
        }
    }

    /// Drug key when the drug is known, summary key otherwise.
    pub fn derive(date_pdufa: NaiveDate, drug: &str, summary: &str) -> Self {
        if has_drug(drug) {
            Self::from_drug(date_pdufa, drug)
        } else {
            Self::from_summary(date_pdufa, summary)
        }
    }

    /// Keys under which a loaded row is reachable, most authoritative first:
    /// recorded `key=` segments in note order, then the drug key.
    pub fn candidates_for_row(row: &LedgerRow) -> Vec<Self> {
        let mut keys: Vec<Self> = row
            .note_segments()
            .filter_map(|seg| Self::from_note_segment(row.date_pdufa, seg))
            .collect();
        if has_drug(&row.drug) {
            let drug_key = Self::from_drug(row.date_pdufa, &row.drug);
            if !keys.contains(&drug_key) {
                keys.push(drug_key);
            }
        }
        keys
    }

    /// Key for a row with no recorded key and no drug.
    ///
    /// `attempt` > 1 disambiguates rows that would otherwise collide.
    pub fn for_unkeyed_row(row: &LedgerRow, attempt: usize) -> Self {
        let digest = normalize_text(&format!("{} {} {}", row.company, row.ticker, row.indication));
        let basis = if attempt > 1 {
            format!("{ROW}{digest}#{attempt}")
        } else {
            format!("{ROW}{digest}")
        };
        Self {
            date_pdufa: row.date_pdufa,
            basis,
        }
    }

    /// Parse a `key=<basis>` notes segment.
    pub fn from_note_segment(date_pdufa: NaiveDate, segment: &str) -> Option<Self> {
        let basis = segment.trim().strip_prefix(KEY_NOTE_PREFIX)?.trim();
        let known = [DRUG, SUMMARY, ROW]
            .iter()
            .any(|prefix| basis.len() > prefix.len() && basis.starts_with(prefix));
        known.then(|| Self {
            date_pdufa,
            basis: basis.to_string(),
        })
    }

    /// The `key=<basis>` segment recorded in notes.
    pub fn note_segment(&self) -> String {
        format!("{KEY_NOTE_PREFIX}{}", self.basis)
    }

    pub fn date_pdufa(&self) -> NaiveDate {
        self.date_pdufa
    }

    pub fn basis(&self) -> &str {
        &self.basis
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", format_date(self.date_pdufa), self.basis)
    }
}

/// Lowercase, turn every non-alphanumeric character into a space, collapse
/// whitespace.
///
/// "Drugzol  XR®" → "drugzol xr"
pub fn normalize_text(s: &str) -> String {
    let mapped: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn has_drug(drug: &str) -> bool {
    !is_unknown(drug) && !normalize_text(drug).is_empty()
}
