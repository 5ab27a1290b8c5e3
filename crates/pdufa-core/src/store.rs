use crate::record::LedgerRow;

/// Persistence boundary of the ledger.
///
/// A run loads once and saves once. `load` on a store that has never been
/// written returns an empty ledger; `save` replaces the whole ledger.
pub trait LedgerStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self) -> Result<Vec<LedgerRow>, Self::Error>;

    fn save(&self, rows: &[LedgerRow]) -> Result<(), Self::Error>;
}
