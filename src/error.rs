use thiserror::Error;

/// Row-scoped error taxonomy for the ingestion engine. No variant is allowed
/// to terminate a batch; the orchestrator records it against the offending
/// row and moves on.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing mandatory field, unrecognized service, malformed date.
    /// The row is skipped and logged; the batch continues.
    #[error("validation failed on '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A natural-key lookup returned more than one candidate. Deterministic
    /// keys should make this impossible; it signals an upstream data
    /// integrity anomaly and is surfaced, never auto-resolved.
    #[error("ambiguous match for {entity} on key {key}: {count} candidates")]
    AmbiguousMatch {
        entity: &'static str,
        key: String,
        count: usize,
    },

    /// A create was attempted that the store's invariants reject, e.g. a
    /// parent with no contact method. The normalizer should have prevented
    /// this; treated as a defensive fault.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Two creations raced on the same natural key. Expected and transient:
    /// callers re-query and use the winning row.
    #[error("constraint conflict on {constraint}")]
    Conflict { constraint: String },

    /// The storage layer is unreachable or failed for reasons unrelated to
    /// this row's data. The row is reported for re-submission.
    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                IngestError::Conflict {
                    constraint: db_err
                        .constraint()
                        .unwrap_or("unknown constraint")
                        .to_string(),
                }
            }
            sqlx::Error::Database(db_err)
                if db_err.is_check_violation() || db_err.is_foreign_key_violation() =>
            {
                IngestError::IntegrityViolation(db_err.message().to_string())
            }
            _ => IngestError::Storage(err),
        }
    }
}

impl IngestError {
    /// Validation errors are skips (bad input, operator fixes the sheet);
    /// everything else is a failure (infrastructure or integrity).
    pub fn is_validation(&self) -> bool {
        matches!(self, IngestError::Validation { .. })
    }
}
