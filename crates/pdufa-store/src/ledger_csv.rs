//! CSV-file ledger.
//!
//! The file is the ledger of record and may be edited by hand between runs.
//! It is read in full, and rewritten in full through a temporary file in the
//! same directory that is then renamed over the target.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use pdufa_core::record::{format_date, format_timestamp};
use pdufa_core::{COLUMNS, DecisionType, LedgerRow, LedgerStore};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::StoreError;

/// Ledger stored as a single CSV file.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
}

/// On-disk shape: every cell as text, in [`COLUMNS`] order.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    date_pdufa: String,
    company: String,
    ticker: String,
    drug: String,
    indication: String,
    priority_review: String,
    decision_type: String,
    source: String,
    announced_at: String,
    notes: String,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row. A file that does not exist yet is an empty ledger.
    pub fn read_rows(&self) -> Result<Vec<LedgerRow>, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no ledger file yet");
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        check_header(&headers)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let raw: CsvRow = record
                .deserialize(Some(&headers))
                .map_err(|e| StoreError::Corrupt {
                    line,
                    reason: e.to_string(),
                })?;
            rows.push(parse_row(raw).map_err(|reason| StoreError::Corrupt { line, reason })?);
        }
        Ok(rows)
    }

    /// Replace the ledger with `rows`.
    pub fn write_rows(&self, rows: &[LedgerRow]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer.write_record(COLUMNS)?;
            for row in rows {
                writer.serialize(to_csv_row(row))?;
            }
            writer.flush()?;
        }
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        info!(rows = rows.len(), path = %self.path.display(), "wrote ledger");
        Ok(())
    }
}

impl LedgerStore for CsvLedger {
    type Error = StoreError;

    fn load(&self) -> Result<Vec<LedgerRow>, StoreError> {
        self.read_rows()
    }

    fn save(&self, rows: &[LedgerRow]) -> Result<(), StoreError> {
        self.write_rows(rows)
    }
}

fn check_header(headers: &StringRecord) -> Result<(), StoreError> {
    let matches = headers.len() == COLUMNS.len()
        && headers.iter().zip(COLUMNS).all(|(found, want)| found.trim() == want);
    if matches {
        return Ok(());
    }
    Err(StoreError::BadHeader {
        expected: COLUMNS.join(","),
        found: headers.iter().collect::<Vec<_>>().join(","),
    })
}

fn parse_row(raw: CsvRow) -> Result<LedgerRow, String> {
    let date_pdufa = NaiveDate::parse_from_str(raw.date_pdufa.trim(), "%Y-%m-%d")
        .map_err(|e| format!("date_pdufa {:?}: {e}", raw.date_pdufa))?;
    let priority_review = match raw.priority_review.trim().to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        other => return Err(format!("priority_review {other:?} is not true/false")),
    };
    let decision_type = raw
        .decision_type
        .parse::<DecisionType>()
        .map_err(|e| e.to_string())?;
    let announced_at = DateTime::parse_from_rfc3339(raw.announced_at.trim())
        .map_err(|e| format!("announced_at {:?}: {e}", raw.announced_at))?;

    Ok(LedgerRow {
        date_pdufa,
        company: raw.company,
        ticker: raw.ticker,
        drug: raw.drug,
        indication: raw.indication,
        priority_review,
        decision_type,
        source: raw.source,
        announced_at,
        notes: raw.notes,
    })
}

fn to_csv_row(row: &LedgerRow) -> CsvRow {
    CsvRow {
        date_pdufa: format_date(row.date_pdufa),
        company: row.company.clone(),
        ticker: row.ticker.clone(),
        drug: row.drug.clone(),
        indication: row.indication.clone(),
        priority_review: row.priority_review.to_string(),
        decision_type: row.decision_type.to_string(),
        source: row.source.clone(),
        announced_at: format_timestamp(&row.announced_at),
        notes: row.notes.clone(),
    }
}
