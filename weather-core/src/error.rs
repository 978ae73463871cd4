use thiserror::Error;

/// Failures surfaced by the local weather store.
///
/// A duplicate primary key is not an error: inserts report it through
/// [`InsertOutcome::Duplicate`](crate::store::InsertOutcome).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required observation field is absent or unusable.
    #[error("malformed observation record: `{field}` {problem}")]
    MalformedRecord {
        field: &'static str,
        problem: &'static str,
    },

    /// A time-range bound that cannot be compared, e.g. NaN.
    #[error("time bound {0} is not a finite number")]
    InvalidTimeBound(f64),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, StoreError::MalformedRecord { .. })
    }
}
