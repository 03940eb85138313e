use thiserror::Error;

/// Result type alias for client store operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Cannot connect to database: {0}")]
    ConnectionFailure(#[source] sqlx::Error),

    #[error("A client with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Client {client_id} already has phone number {number}")]
    DuplicatePhone { client_id: i32, number: String },

    #[error("Client with ID {0} does not exist")]
    ClientNotFound(i32),

    #[error("Email {0} is already used by another client")]
    EmailInUse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Whether the store rejected a statement because of a unique constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

/// Map a unique-violation onto the given domain error, return anything else as-is.
pub(crate) fn on_unique_violation(err: sqlx::Error, conflict: impl FnOnce() -> ClientError) -> ClientError {
    if is_unique_violation(&err) {
        conflict()
    } else {
        ClientError::Database(err)
    }
}
