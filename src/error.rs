use thiserror::Error;

/// Why a document could not be obtained from the source provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Upstream confirmed the resource does not exist. Safe to record as
    /// permanently absent.
    #[error("{resource} not found upstream")]
    NotFound { resource: String },
    #[error("transient failure fetching {resource}: {message}")]
    Transient { resource: String, message: String },
    #[error("malformed document for {resource}: {message}")]
    Malformed { resource: String, message: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("sqlite error during migration: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot migrate {table}.{column}: {reason}")]
    Migration {
        table: String,
        column: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Success { rows: usize },
    TransientFailure(String),
    ConfirmedAbsent,
    IntegrityViolation(String),
}

impl From<IngestError> for UnitOutcome {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Integrity(reason) => UnitOutcome::IntegrityViolation(reason),
            IngestError::Fetch(FetchError::NotFound { .. }) => UnitOutcome::ConfirmedAbsent,
            IngestError::Fetch(other) => UnitOutcome::TransientFailure(other.to_string()),
            IngestError::Store(err) => UnitOutcome::TransientFailure(format!("store: {err}")),
        }
    }
}
