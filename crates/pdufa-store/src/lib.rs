//! Ledger persistence: CSV file (the ledger of record) and Parquet snapshots.

mod error;
mod ledger_csv;
pub use error::StoreError;
pub use ledger_csv::CsvLedger;

#[cfg(feature = "parquet")]
mod snapshot;
#[cfg(feature = "parquet")]
pub use snapshot::export_parquet;
