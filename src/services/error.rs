//! Error types for transaction handling

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),
    #[error("unit of work panicked: {0}")]
    Panicked(String),
    #[error("unit of work panicked: {0}")]
    PanickedWith(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("transaction connection is already in use")]
    Busy,
    #[error("no transaction in context")]
    NoTransaction,
    #[error("transaction already committed or rolled back")]
    Finished,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Extension trait for logging a failure that is not going to be returned
pub trait LogErr<T> {
    /// Log error with context at warn level and discard it
    fn log_warn(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        self.map_err(|e| {
            tracing::warn!(error = %e, "{}", context);
        })
        .ok()
    }
}
