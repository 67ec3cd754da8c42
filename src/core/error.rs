use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Row {1} not found in table '{0}'")]
    RowNotFound(&'static str, i64),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Storage scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
