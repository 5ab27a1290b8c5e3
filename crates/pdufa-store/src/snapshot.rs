use std::fs::File;
use std::path::Path;

use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use pdufa_core::{LedgerRow, ledger};
use tracing::info;

use crate::StoreError;

/// Write `rows` as a single-batch Parquet file, replacing `path`.
pub fn export_parquet(rows: &[LedgerRow], path: &Path) -> Result<(), StoreError> {
    let batch = ledger::to_record_batch(rows)?;
    let props = WriterProperties::builder()
        .set_created_by("pdufa".to_string())
        .build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    info!(rows = rows.len(), path = %path.display(), "wrote parquet snapshot");
    Ok(())
}
