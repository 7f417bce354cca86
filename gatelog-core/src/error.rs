use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller supplied an empty or malformed required field.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backing store could not complete the call.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User with badge {0} already exists")]
    DuplicateBadge(String),

    #[error("Credential error: {0}")]
    Credential(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::StoreUnavailable(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for CoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CoreError::StoreUnavailable(format!("migration failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
