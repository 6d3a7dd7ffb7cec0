use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("not authorized")]
    NotAuthorized,

    #[error("store temporarily unavailable")]
    TransientStoreFailure,

    #[error("concurrent write conflict")]
    ConflictRetryable,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            // A busy or locked database is retryable; everything else is
            // an infrastructure fault handled at the outer boundary.
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                Error::TransientStoreFailure
            }
            _ => Error::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
