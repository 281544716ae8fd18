use thiserror::Error;

/// Errors returned by a [`Store`](crate::Store)
#[derive(Debug, Error)]
pub enum StoreError {
    /// A create hit a uniqueness constraint
    #[error("constraint violation on {table}: {message}")]
    ConstraintViolation {
        /// Table the write targeted
        table: &'static str,
        /// Message reported by the database
        message: String,
    },
    /// A value does not fit the column type
    #[error("value out of range for column {0}")]
    OutOfRange(&'static str),
    /// Any other database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether this error is a rejected duplicate create
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}
