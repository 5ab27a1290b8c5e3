//! Merge extracted records into the ledger.
//!
//! A row is found by its identity key or one of its aliases. Matched rows are
//! only ever completed: a field still at its default takes a non-default new
//! value, everything else is left alone. `source` and `notes` accumulate.
//! Rows are never removed.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::extract::Candidate;
use crate::key::{IdentityKey, has_drug};
use crate::record::{LedgerRow, NOTE_SEPARATOR, SOURCE_SEPARATOR, is_unknown, split_segments};

/// What a single merge did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// In-memory ledger keyed by identity.
#[derive(Debug, Default)]
pub struct Ledger {
    rows: BTreeMap<IdentityKey, LedgerRow>,
    /// Alias → primary key in `rows`.
    aliases: HashMap<IdentityKey, IdentityKey>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index loaded rows.
    ///
    /// The first free candidate key of a row becomes its primary key, the
    /// rest become aliases. A key already claimed by an earlier row stays
    /// with that row; rows left without any key get a `row:` fallback.
    pub fn from_rows(rows: impl IntoIterator<Item = LedgerRow>) -> Self {
        let mut ledger = Self::new();
        for row in rows {
            let candidates = IdentityKey::candidates_for_row(&row);
            let mut free = candidates.into_iter().filter(|k| !ledger.is_taken(k));
            let primary = match free.next() {
                Some(key) => key,
                None => ledger.unkeyed_slot(&row),
            };
            let aliases: Vec<IdentityKey> = free.collect();
            trace!(key = %primary, aliases = aliases.len(), "indexed ledger row");
            for alias in aliases {
                ledger.aliases.insert(alias, primary.clone());
            }
            ledger.rows.insert(primary, row);
        }
        ledger
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row reachable under `key`, directly or through an alias.
    pub fn get(&self, key: &IdentityKey) -> Option<&LedgerRow> {
        self.resolve(key).and_then(|primary| self.rows.get(primary))
    }

    /// Merge one candidate.
    ///
    /// The candidate's own key is tried first. Failing that, its fallback
    /// key finds a row that was recorded before its drug was known.
    pub fn merge(&mut self, candidate: Candidate) -> MergeOutcome {
        let Candidate {
            key,
            fallback,
            record,
        } = candidate;
        let target = self
            .resolve(&key)
            .or_else(|| fallback.as_ref().and_then(|f| self.resolve_drugless(f)))
            .cloned();
        let Some(primary) = target else {
            debug!(%key, "inserting new ledger row");
            if let Some(alias) = fallback.filter(|f| !self.is_taken(f)) {
                self.aliases.insert(alias, key.clone());
            }
            self.rows.insert(key, record);
            return MergeOutcome::Inserted;
        };

        let Some(row) = self.rows.get_mut(&primary) else {
            return MergeOutcome::Unchanged;
        };
        if !merge_into(row, &record) {
            return MergeOutcome::Unchanged;
        }
        debug!(%key, row = %primary, "updated ledger row");

        // A filled-in drug makes the row reachable under its drug key too.
        let fresh: Vec<IdentityKey> = IdentityKey::candidates_for_row(row)
            .into_iter()
            .filter(|k| !self.is_taken(k))
            .collect();
        for alias in fresh {
            self.aliases.insert(alias, primary.clone());
        }
        MergeOutcome::Updated
    }

    /// Rows ordered by date, then identity key.
    pub fn into_rows(self) -> Vec<LedgerRow> {
        self.rows.into_values().collect()
    }

    fn resolve(&self, key: &IdentityKey) -> Option<&IdentityKey> {
        match self.rows.get_key_value(key) {
            Some((primary, _)) => Some(primary),
            None => self.aliases.get(key),
        }
    }

    /// Like `resolve`, but only for a row whose drug is still unknown.
    fn resolve_drugless(&self, key: &IdentityKey) -> Option<&IdentityKey> {
        self.resolve(key)
            .filter(|primary| self.rows.get(*primary).is_some_and(|row| !has_drug(&row.drug)))
    }

    fn is_taken(&self, key: &IdentityKey) -> bool {
        self.rows.contains_key(key) || self.aliases.contains_key(key)
    }

    fn unkeyed_slot(&self, row: &LedgerRow) -> IdentityKey {
        (1..)
            .map(|attempt| IdentityKey::for_unkeyed_row(row, attempt))
            .find(|key| !self.is_taken(key))
            .unwrap_or_else(|| IdentityKey::for_unkeyed_row(row, 0))
    }
}

/// Complete `existing` from `new`. Returns whether anything changed.
///
/// `date_pdufa` and `announced_at` are never touched.
pub fn merge_into(existing: &mut LedgerRow, new: &LedgerRow) -> bool {
    let mut changed = false;

    for (current, incoming) in [
        (&mut existing.company, &new.company),
        (&mut existing.ticker, &new.ticker),
        (&mut existing.drug, &new.drug),
        (&mut existing.indication, &new.indication),
    ] {
        if is_unknown(current) && !is_unknown(incoming) {
            current.clone_from(incoming);
            changed = true;
        }
    }

    if !existing.priority_review && new.priority_review {
        existing.priority_review = true;
        changed = true;
    }
    if existing.decision_type.is_unknown() && !new.decision_type.is_unknown() {
        existing.decision_type = new.decision_type;
        changed = true;
    }

    changed |= accumulate(&mut existing.source, &new.source, SOURCE_SEPARATOR);
    changed |= accumulate(&mut existing.notes, &new.notes, NOTE_SEPARATOR);
    changed
}

/// Append the segments of `incoming` that `current` lacks.
///
/// `current` is left byte-for-byte alone when nothing is new.
fn accumulate(current: &mut String, incoming: &str, sep: &str) -> bool {
    let mut segments: Vec<&str> = if is_unknown(current) {
        Vec::new()
    } else {
        split_segments(current, sep).collect()
    };
    let before = segments.len();
    for segment in split_segments(incoming, sep) {
        if !is_unknown(segment) && !segments.contains(&segment) {
            segments.push(segment);
        }
    }
    if segments.len() == before {
        return false;
    }
    *current = segments.join(sep);
    true
}
