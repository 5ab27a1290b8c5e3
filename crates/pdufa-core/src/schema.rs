/// Arrow schema and batch conversion for the ledger.
pub mod ledger {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, BooleanArray, Date32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::error::ArrowError;
    use arrow::record_batch::RecordBatch;
    use chrono::Datelike;

    use crate::record::{COLUMNS, LedgerRow};

    /// Days from 0001-01-01 to 1970-01-01.
    const UNIX_EPOCH_FROM_CE: i32 = 719_163;

    /// Ledger columns in persisted order. `announced_at` stays text so the
    /// run's UTC offset survives.
    pub fn ledger_schema() -> Schema {
        let fields = COLUMNS.iter().map(|&name| {
            let data_type = match name {
                "date_pdufa" => DataType::Date32,
                "priority_review" => DataType::Boolean,
                _ => DataType::Utf8,
            };
            Field::new(name, data_type, false)
        });
        Schema::new(fields.collect::<Vec<_>>())
    }

    pub fn to_record_batch(rows: &[LedgerRow]) -> Result<RecordBatch, ArrowError> {
        let schema = Arc::new(ledger_schema());
        let columns: Vec<ArrayRef> = COLUMNS
            .iter()
            .map(|&name| -> ArrayRef {
                match name {
                    "date_pdufa" => Arc::new(Date32Array::from(
                        rows.iter()
                            .map(|r| r.date_pdufa.num_days_from_ce() - UNIX_EPOCH_FROM_CE)
                            .collect::<Vec<i32>>(),
                    )),
                    "priority_review" => Arc::new(BooleanArray::from(
                        rows.iter().map(|r| r.priority_review).collect::<Vec<bool>>(),
                    )),
                    _ => Arc::new(StringArray::from(
                        rows.iter()
                            .map(|r| r.field(name).unwrap_or_default())
                            .collect::<Vec<String>>(),
                    )),
                }
            })
            .collect();
        RecordBatch::try_new(schema, columns)
    }
}
