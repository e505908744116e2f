use thiserror::Error;

/// Typed failures of the key lifecycle and consumption paths. Everything a
/// caller can act on is a distinct variant; infrastructure trouble stays in
/// `Database` and is never shown verbatim to clients.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("no API key matches the presented token")]
    InvalidToken,

    #[error("API key has expired")]
    Expired,

    #[error("API key quota is exhausted")]
    QuotaExhausted,

    #[error("key does not exist")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("token generation collided with an existing key")]
    Conflict,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl KeyError {
    /// True when the generated token hit the UNIQUE constraint and a retry
    /// with a fresh token is warranted.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
            _ => false,
        }
    }
}
