use thiserror::Error;

/// Domain errors that callers branch on. Plumbing failures stay in
/// `anyhow` with context.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("missing setup artifact: {0} (run `classify-rest setup` first)")]
    MissingSetup(String),

    #[error("normalization incomplete: expected {expected} volumes, found {found}")]
    NormalizationIncomplete { expected: u32, found: u32 },

    #[error("no dot-product series found for aggregation")]
    NoData,

    #[error("unit '{0}' exceeded its wall-clock budget")]
    UnitTimeout(String),
}
