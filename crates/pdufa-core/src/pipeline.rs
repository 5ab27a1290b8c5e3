//! One extraction run: normalize, filter, extract, merge.
//!
//! [`run`] is pure. [`run_with_store`] wraps it with exactly one load and one
//! save, and writes nothing when any step before the save fails.

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::{ConfigError, PipelineError};
use crate::event::RawEvent;
use crate::extract::extract;
use crate::merge::{Ledger, MergeOutcome};
use crate::normalize::{DropReason, Normalizer};
use crate::record::LedgerRow;
use crate::store::LedgerStore;

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub received: usize,
    pub dropped_no_date: usize,
    pub dropped_empty_summary: usize,
    pub out_of_window: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub ledger_rows: usize,
}

impl RunStats {
    fn count(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Full ledger, sorted.
    pub rows: Vec<LedgerRow>,
    pub stats: RunStats,
}

/// Merge `events` into `existing` and return the new ledger.
///
/// `run_at` becomes the `announced_at` of every inserted row, expressed in
/// the configured zone and truncated to whole seconds.
pub fn run(
    existing: Vec<LedgerRow>,
    events: &[RawEvent],
    config: &RunConfig,
    run_at: DateTime<Utc>,
) -> Result<RunOutcome, ConfigError> {
    config.validate()?;
    let tz = config.resolve_timezone();
    let local_run_at = run_at.with_timezone(&tz);
    let window = config.date_window(local_run_at.date_naive())?;
    let announced_at = local_run_at.fixed_offset().trunc_subsecs(0);

    let normalizer = Normalizer::new(tz, config.datetime_policy);
    let mut ledger = Ledger::from_rows(existing);
    let mut stats = RunStats {
        received: events.len(),
        ..RunStats::default()
    };

    for raw in events {
        let event = match normalizer.normalize(raw) {
            Ok(event) => event,
            Err(DropReason::EmptySummary) => {
                debug!(uid = ?raw.uid, feed = %raw.source_feed, "dropping event with empty summary");
                stats.dropped_empty_summary += 1;
                continue;
            }
            Err(DropReason::MissingStart) => {
                debug!(summary = %raw.summary, "dropping event without start date");
                stats.dropped_no_date += 1;
                continue;
            }
            Err(DropReason::UnparseableStart(value)) => {
                warn!(summary = %raw.summary, start = %value, "dropping event with unparseable start date");
                stats.dropped_no_date += 1;
                continue;
            }
        };

        if !window.contains(event.decision_date) {
            debug!(date = %event.decision_date, summary = %event.summary_text, "event outside date window");
            stats.out_of_window += 1;
            continue;
        }

        let outcome = ledger.merge(extract(&event, announced_at));
        stats.count(outcome);
    }

    stats.ledger_rows = ledger.len();
    info!(
        received = stats.received,
        inserted = stats.inserted,
        updated = stats.updated,
        unchanged = stats.unchanged,
        dropped = stats.dropped_no_date + stats.dropped_empty_summary,
        out_of_window = stats.out_of_window,
        ledger_rows = stats.ledger_rows,
        "run complete"
    );
    Ok(RunOutcome {
        rows: ledger.into_rows(),
        stats,
    })
}

/// Load from `store`, [`run`], save back.
pub fn run_with_store<S: LedgerStore>(
    store: &S,
    events: &[RawEvent],
    config: &RunConfig,
    run_at: DateTime<Utc>,
) -> Result<RunStats, PipelineError<S::Error>> {
    config.validate()?;
    let existing = store.load().map_err(PipelineError::Load)?;
    debug!(rows = existing.len(), "loaded ledger");
    let outcome = run(existing, events, config, run_at)?;
    store.save(&outcome.rows).map_err(PipelineError::Save)?;
    Ok(outcome.stats)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::convert::Infallible;

    use super::*;
    use crate::event::RawStart;
    use crate::record::DecisionType;
    use chrono::{NaiveDate, TimeZone};

    #[derive(Default)]
    struct MemoryStore {
        rows: RefCell<Vec<LedgerRow>>,
        saves: RefCell<usize>,
    }

    impl LedgerStore for MemoryStore {
        type Error = Infallible;

        fn load(&self) -> Result<Vec<LedgerRow>, Infallible> {
            Ok(self.rows.borrow().clone())
        }

        fn save(&self, rows: &[LedgerRow]) -> Result<(), Infallible> {
            *self.rows.borrow_mut() = rows.to_vec();
            *self.saves.borrow_mut() += 1;
            Ok(())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct Broken;

    struct BrokenStore;

    impl LedgerStore for BrokenStore {
        type Error = Broken;

        fn load(&self) -> Result<Vec<LedgerRow>, Broken> {
            Err(Broken)
        }

        fn save(&self, _: &[LedgerRow]) -> Result<(), Broken> {
            panic!("save must not be reached");
        }
    }

    fn event(summary: &str, start: Option<&str>, feed: &str) -> RawEvent {
        RawEvent {
            uid: None,
            summary: summary.into(),
            description: None,
            start: start.map(RawStart::new),
            source_feed: feed.into(),
        }
    }

    fn config() -> RunConfig {
        let mut cfg = RunConfig::with_feeds(["https://calendar.example/pdufa.ics"]);
        cfg.timezone = "America/New_York".into();
        cfg
    }

    fn run_at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 14, 0, 0).unwrap()
    }

    const ACME: &str =
        "FDA PDUFA date for Acme Pharma (ACME) — Drugzol for treatment of migraine, priority review";

    #[test]
    fn acme_event_becomes_a_row() {
        let out = run(Vec::new(), &[event(ACME, Some("20250314"), "feed-a")], &config(), run_at(1))
            .unwrap();
        assert_eq!(out.stats.inserted, 1);
        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.date_pdufa, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(row.drug, "Drugzol");
        assert_eq!(row.decision_type, DecisionType::Priority);
        assert_eq!(row.announced_at.to_rfc3339(), "2025-03-01T09:00:00-05:00");
    }

    #[test]
    fn event_without_start_is_dropped_and_counted() {
        let out = run(
            Vec::new(),
            &[event("Acme Pharma (ACME) PDUFA", None, "feed-a")],
            &config(),
            run_at(1),
        )
        .unwrap();
        assert!(out.rows.is_empty());
        assert_eq!(out.stats.dropped_no_date, 1);
        assert_eq!(out.stats.received, 1);
    }

    #[test]
    fn empty_summary_and_garbage_start_are_counted_separately() {
        let events = [
            event("  ", Some("20250314"), "feed-a"),
            event("Acme PDUFA", Some("soon"), "feed-a"),
        ];
        let stats = run(Vec::new(), &events, &config(), run_at(1)).unwrap().stats;
        assert_eq!(stats.dropped_empty_summary, 1);
        assert_eq!(stats.dropped_no_date, 1);
        assert_eq!(stats.ledger_rows, 0);
    }

    #[test]
    fn second_identical_run_changes_nothing() {
        let events = [event(ACME, Some("20250314"), "feed-a")];
        let first = run(Vec::new(), &events, &config(), run_at(1)).unwrap();
        let second = run(first.rows.clone(), &events, &config(), run_at(2)).unwrap();
        assert_eq!(second.rows, first.rows);
        assert_eq!(second.stats.unchanged, 1);
        assert_eq!(second.stats.inserted, 0);
    }

    #[test]
    fn existing_rows_without_events_pass_through() {
        let first = run(
            Vec::new(),
            &[event(ACME, Some("20250314"), "feed-a")],
            &config(),
            run_at(1),
        )
        .unwrap();
        let second = run(first.rows.clone(), &[], &config(), run_at(2)).unwrap();
        assert_eq!(second.rows, first.rows);
    }

    #[test]
    fn same_events_in_any_order_give_same_ledger() {
        let a = event(ACME, Some("20250314"), "feed-a");
        let b = event("Beta Bio (BETA): Betamab for lupus", Some("20250102"), "feed-b");
        let c = event("Acme Pharma (ACME) Drugzol PDUFA", Some("20250314"), "feed-b");
        let d = event("Zeta Bio (ZETA) PDUFA for Zetavir", Some("20250314"), "feed-a");
        let one = run(
            Vec::new(),
            &[a.clone(), b.clone(), c.clone(), d.clone()],
            &config(),
            run_at(1),
        )
        .unwrap();
        let two = run(Vec::new(), &[d, c, b, a], &config(), run_at(1)).unwrap();
        assert_eq!(one.rows, two.rows);
        assert_eq!(one.rows.len(), 4);
        assert_eq!(one.rows[0].date_pdufa, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        let same_day: Vec<&str> = one.rows[1..].iter().map(|r| r.drug.as_str()).collect();
        assert_eq!(same_day, vec!["Drugzol", "Zetavir", "unknown"]);
    }

    fn with_description(summary: &str, description: &str, feed: &str) -> RawEvent {
        RawEvent {
            description: Some(description.into()),
            ..event(summary, Some("20250314"), feed)
        }
    }

    #[test]
    fn drug_appearing_later_fills_the_existing_row() {
        let bare = [event("Acme Pharma (ACME) PDUFA", Some("20250314"), "feed-a")];
        let detailed = [with_description(
            "Acme Pharma (ACME) PDUFA",
            "Approval of the therapy Drugzol",
            "feed-a",
        )];

        let first = run(Vec::new(), &bare, &config(), run_at(1)).unwrap();
        assert_eq!(first.rows[0].drug, "unknown");

        let second = run(first.rows, &detailed, &config(), run_at(2)).unwrap();
        assert_eq!(second.stats.updated, 1);
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].drug, "Drugzol");

        let third = run(second.rows.clone(), &detailed, &config(), run_at(3)).unwrap();
        assert_eq!(third.rows, second.rows);
        let fourth = run(third.rows, &bare, &config(), run_at(4)).unwrap();
        assert_eq!(fourth.rows, second.rows);
    }

    #[test]
    fn drug_disappearing_later_keeps_one_row() {
        let detailed = [with_description(
            "Acme Pharma (ACME) PDUFA",
            "Approval of the therapy Drugzol",
            "feed-a",
        )];
        let bare = [event("Acme Pharma (ACME) PDUFA", Some("20250314"), "feed-a")];

        let first = run(Vec::new(), &detailed, &config(), run_at(1)).unwrap();
        let second = run(first.rows.clone(), &bare, &config(), run_at(2)).unwrap();
        assert_eq!(second.stats.inserted, 0);
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].drug, "Drugzol");
    }

    #[test]
    fn drug_appearing_within_one_run_keeps_one_row() {
        let events = [
            event("Acme Pharma (ACME) PDUFA", Some("20250314"), "feed-a"),
            with_description("Acme Pharma (ACME) PDUFA", "Approval of the therapy Drugzol", "feed-b"),
        ];
        let out = run(Vec::new(), &events, &config(), run_at(1)).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].drug, "Drugzol");
        assert_eq!(out.rows[0].source, "feed-a,feed-b");
    }

    #[test]
    fn date_window_filters_events() {
        let mut cfg = config();
        cfg.min_date = Some("@today".into());
        let events = [
            event(ACME, Some("20250314"), "feed-a"),
            event("Old Co (OLD) PDUFA for Oldzol", Some("20240101"), "feed-a"),
        ];
        let out = run(Vec::new(), &events, &cfg, run_at(1)).unwrap();
        assert_eq!(out.stats.out_of_window, 1);
        assert_eq!(out.rows.len(), 1);
    }

    #[test]
    fn invalid_config_fails_before_anything_happens() {
        let store = MemoryStore::default();
        let result = run_with_store(&store, &[], &RunConfig::default(), run_at(1));
        assert!(matches!(result, Err(PipelineError::Config(_))));
        assert_eq!(*store.saves.borrow(), 0);
    }

    #[test]
    fn store_round_trip() {
        let store = MemoryStore::default();
        let events = [event(ACME, Some("20250314"), "feed-a")];
        let stats = run_with_store(&store, &events, &config(), run_at(1)).unwrap();
        assert_eq!(stats.inserted, 1);
        let stats = run_with_store(&store, &events, &config(), run_at(2)).unwrap();
        assert_eq!(stats.unchanged, 1);
        assert_eq!(store.rows.borrow().len(), 1);
        assert_eq!(*store.saves.borrow(), 2);
    }

    #[test]
    fn load_failure_propagates_without_saving() {
        let result = run_with_store(&BrokenStore, &[], &config(), run_at(1));
        assert!(matches!(result, Err(PipelineError::Load(Broken))));
    }
}
