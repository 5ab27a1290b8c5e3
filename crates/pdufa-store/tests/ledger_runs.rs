//! Several runs against a CSV ledger on disk, with hand edits in between.

use std::fs;

use chrono::{DateTime, TimeZone, Utc};
use pdufa_core::{LedgerStore, RawEvent, RawStart, RunConfig, UNKNOWN, run_with_store};
use pdufa_store::CsvLedger;

const ACME: &str =
    "FDA PDUFA date for Acme Pharma (ACME) — Drugzol for treatment of migraine, priority review";

fn event(summary: &str, start: &str, feed: &str) -> RawEvent {
    RawEvent {
        uid: None,
        summary: summary.into(),
        description: None,
        start: Some(RawStart::new(start)),
        source_feed: feed.into(),
    }
}

fn config() -> RunConfig {
    let mut cfg = RunConfig::with_feeds(["https://calendar.example/pdufa.ics"]);
    cfg.timezone = "America/New_York".into();
    cfg
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, 14, 0, 0).unwrap()
}

#[test]
fn repeated_runs_leave_the_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pdufa.csv");
    let store = CsvLedger::new(&path);
    let events = [event(ACME, "20250314", "FDA Tracker")];

    let first = run_with_store(&store, &events, &config(), at(1)).unwrap();
    assert_eq!(first.inserted, 1);
    let before = fs::read_to_string(&path).unwrap();

    let second = run_with_store(&store, &events, &config(), at(2)).unwrap();
    assert_eq!(second.unchanged, 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn manual_drug_correction_survives_later_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pdufa.csv");
    let store = CsvLedger::new(&path);
    let events = [event(ACME, "20250314", "FDA Tracker")];

    run_with_store(&store, &events, &config(), at(1)).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains(",Drugzol,"));
    fs::write(&path, text.replace(",Drugzol,", ",Drugzol XR,")).unwrap();

    run_with_store(&store, &events, &config(), at(2)).unwrap();
    let rows = store.load().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].drug, "Drugzol XR");
}

#[test]
fn later_feed_completes_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvLedger::new(dir.path().join("pdufa.csv"));

    let sparse = [event("Acme Pharma (ACME): Drugzol for FDA review", "20250314", "feed-a")];
    run_with_store(&store, &sparse, &config(), at(1)).unwrap();
    let rows = store.load().unwrap();
    assert_eq!(rows[0].indication, UNKNOWN);
    assert!(!rows[0].priority_review);

    let rich = [event(ACME, "20250314", "feed-b")];
    let stats = run_with_store(&store, &rich, &config(), at(2)).unwrap();
    assert_eq!(stats.updated, 1);

    let rows = store.load().unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.indication, "migraine");
    assert!(row.priority_review);
    assert_eq!(row.source, "feed-a,feed-b");
    assert_eq!(
        row.announced_at,
        DateTime::parse_from_rfc3339("2025-03-01T09:00:00-05:00").unwrap()
    );
}

#[test]
fn hand_added_rows_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pdufa.csv");
    let store = CsvLedger::new(&path);
    run_with_store(&store, &[event(ACME, "20250314", "feed-a")], &config(), at(1)).unwrap();

    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("2025-01-02,Beta Bio,BETA,unknown,lupus,false,standard,manual,2025-01-01T00:00:00Z,added by hand\n");
    fs::write(&path, text).unwrap();

    run_with_store(&store, &[event(ACME, "20250314", "feed-a")], &config(), at(2)).unwrap();
    let rows = store.load().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].company, "Beta Bio");
    assert_eq!(rows[1].drug, "Drugzol");
}

#[test]
fn corrupt_ledger_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pdufa.csv");
    fs::write(&path, "not,a,ledger\n1,2,3\n").unwrap();
    let store = CsvLedger::new(&path);

    let result = run_with_store(&store, &[event(ACME, "20250314", "feed-a")], &config(), at(1));
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), "not,a,ledger\n1,2,3\n");
}
