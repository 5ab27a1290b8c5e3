//! Terminal rendering of ledger rows.
//!
//! Rows go through the Arrow ledger schema so the table view can use
//! Arrow's pretty printer and the card view can format by column type.

use anyhow::Result;
use arrow::array::{Array, BooleanArray, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::ArrayFormatter;
use arrow::util::pretty::pretty_format_batches;
use pdufa_core::record::NOTE_SEPARATOR;
use pdufa_core::{LedgerRow, ledger};

// ── Card section groupings ──

const DECISION: &[&str] = &["date_pdufa", "decision_type", "priority_review"];
const SPONSOR: &[&str] = &["company", "ticker"];
const PRODUCT: &[&str] = &["drug", "indication"];
const PROVENANCE: &[&str] = &["source", "announced_at"];

/// Columns left out of the table view.
const TABLE_HIDDEN: &[&str] = &["notes"];

// ── Public API ──

/// Print rows as one table, without notes.
pub fn print_table(rows: &[LedgerRow]) -> Result<()> {
    let batch = ledger::to_record_batch(rows)?;
    let schema = batch.schema();
    let visible: Vec<usize> = (0..schema.fields().len())
        .filter(|&i| !TABLE_HIDDEN.contains(&schema.field(i).name().as_str()))
        .collect();
    let batch = batch.project(&visible)?;
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}

/// Print every row as a vertical card grouped by section.
pub fn print_cards(rows: &[LedgerRow]) -> Result<()> {
    let batch = ledger::to_record_batch(rows)?;
    for i in 0..batch.num_rows() {
        print_card(&batch.slice(i, 1));
    }
    Ok(())
}

fn print_card(batch: &RecordBatch) {
    let drug = get_utf8(batch, "drug").unwrap_or_default();
    let company = get_utf8(batch, "company").unwrap_or_default();
    println!("=== {drug} ({company}) ===");
    println!();

    print_section(batch, "Decision", DECISION);
    print_section(batch, "Sponsor", SPONSOR);
    print_section(batch, "Product", PRODUCT);
    print_section(batch, "Provenance", PROVENANCE);
    print_notes(batch);
}

// ── Section rendering ──

fn print_section(batch: &RecordBatch, header: &str, cols: &[&str]) {
    println!("{header}");
    let schema = batch.schema();
    for &col_name in cols {
        let Ok(idx) = schema.index_of(col_name) else {
            continue;
        };
        let col = batch.column(idx);
        if col.is_null(0) {
            continue;
        }
        match schema.field(idx).data_type() {
            DataType::Boolean => {
                if let Some(arr) = col.as_any().downcast_ref::<BooleanArray>() {
                    println!("  {:<18} {}", col_name, if arr.value(0) { "yes" } else { "no" });
                }
            }
            DataType::Utf8 => {
                if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
                    println!("  {:<18} {}", col_name, arr.value(0));
                }
            }
            _ => match ArrayFormatter::try_new(col.as_ref(), &Default::default()) {
                Ok(fmt) => println!("  {:<18} {}", col_name, fmt.value(0)),
                Err(_) => println!("  {:<18} ({})", col_name, col.data_type()),
            },
        }
    }
    println!();
}

fn print_notes(batch: &RecordBatch) {
    let Some(notes) = get_utf8(batch, "notes") else {
        return;
    };
    let segments: Vec<&str> = notes
        .split(NOTE_SEPARATOR.trim())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return;
    }
    println!("Notes");
    for segment in segments {
        println!("  - {segment}");
    }
    println!();
}

// ── Helpers ──

fn get_utf8(batch: &RecordBatch, col_name: &str) -> Option<String> {
    let col = batch.column_by_name(col_name)?;
    if col.is_null(0) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(0).to_string())
}
