//! Error types for z-loyalty storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Login already registered.
    #[error("login already registered")]
    DuplicateLogin,

    /// The order was already submitted by the same user.
    #[error("order already uploaded")]
    AlreadyUploaded,

    /// The order was already submitted by a different user.
    #[error("order already uploaded by another user")]
    AlreadyUploadedByOther,

    /// Balance cannot cover the requested debit.
    #[error("insufficient balance: balance={balance}, requested={requested}")]
    InsufficientBalance {
        /// Current balance in cents.
        balance: i64,
        /// Requested debit in cents.
        requested: i64,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(err.to_string())
    }
}
