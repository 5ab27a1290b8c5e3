use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration lists no feeds")]
    NoFeeds,

    #[error("invalid date expression {expr:?} (expected YYYY-MM-DD, @today or @today+/-N[dwmy])")]
    InvalidDateExpr { expr: String },
}

#[derive(Debug, Error)]
#[error("unrecognised decision type {0:?}")]
pub struct ParseDecisionTypeError(pub String);

/// Whole-run failure surfaced to the caller.
///
/// Per-event problems never show up here; they are absorbed and counted.
#[derive(Debug, Error)]
pub enum PipelineError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("loading ledger failed: {0}")]
    Load(#[source] E),

    #[error("saving ledger failed: {0}")]
    Save(#[source] E),
}
