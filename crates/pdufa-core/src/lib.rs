pub mod config;
pub mod error;
pub mod event;
pub mod extract;
pub mod key;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod store;

pub use config::{DateWindow, RunConfig};
pub use error::{ConfigError, PipelineError};
pub use event::{NormalizedEvent, RawEvent, RawStart};
pub use extract::{Candidate, extract};
pub use key::IdentityKey;
pub use merge::{Ledger, MergeOutcome};
pub use normalize::{DateTimePolicy, DropReason, Normalizer};
pub use pipeline::{RunOutcome, RunStats, run, run_with_store};
pub use record::{COLUMNS, DecisionType, ExtractedRecord, LedgerRow, UNKNOWN};
pub use schema::ledger;
pub use store::LedgerStore;
