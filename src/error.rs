use deadpool_sqlite::rusqlite;
use thiserror::Error;

/// Error type shared by every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum DbError {
    /// The driver rejected the SQL text during `query`.
    #[error("failed to prepare `{query}`: {source}")]
    Prepare {
        query: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The driver failed while executing a prepared statement.
    #[error("failed to execute `{query}`: {source}")]
    Execution {
        query: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The provider could not supply a connection, or the statement worker
    /// backing a connection is gone.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// `execute`/`execute_update` called before `query`.
    #[error("execute called before query on this statement")]
    NoActiveStatement,

    /// A typed row accessor found a value of the wrong variant.
    #[error("column `{column}`: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Pool(#[from] deadpool::managed::PoolError<rusqlite::Error>),

    #[error("configuration error: {0}")]
    Config(String),

    /// An async dispatch or worker reply channel was dropped before
    /// completing.
    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

impl From<deadpool_sqlite::InteractError> for DbError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        DbError::ConnectionUnavailable(format!("sqlite interact error: {err}"))
    }
}
