//! Async convenience layer over pooled `SQLite` connections.
//!
//! A [`Database`] owns a connection pool and hands out managed
//! [`Statement`]s: each statement exclusively owns one pooled connection,
//! tracks its prepared statement, row cursor, and transaction state, and
//! guarantees the connection returns to the pool exactly once — on every
//! path, including errors and drops. On top of that sit one-shot query
//! helpers, future-returning dispatch variants, a transaction helper with
//! commit/rollback hooks, and a deferred write queue drained by a single
//! consumer.
//!
//! ```no_run
//! use db_conduit::prelude::*;
//!
//! # async fn demo() -> Result<(), DbError> {
//! let db = DatabaseOptions::builder("app.sqlite3")
//!     .pool_name("app")
//!     .open()
//!     .await?;
//!
//! db.execute_update(
//!     "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)",
//!     &[],
//! )
//! .await?;
//!
//! let id = db
//!     .execute_insert(
//!         "INSERT INTO users (name) VALUES (?)",
//!         &[RowValue::Text("alice".into())],
//!     )
//!     .await?;
//!
//! let row = db
//!     .get_first_row(
//!         "SELECT id, name FROM users WHERE id = ?",
//!         &[RowValue::Int(id.unwrap())],
//!     )
//!     .await?;
//! let row = row.unwrap();
//! assert_eq!(row.get_string("name")?, Some("alice"));
//!
//! db.close_default().await;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod error;
pub mod global;
pub mod options;
pub mod prelude;
pub mod provider;
pub mod queue;
pub mod row;
pub mod statement;
pub mod timings;
pub mod types;

pub use database::{Database, DbFuture, TransactionOutcome};
pub use error::DbError;
pub use options::{DatabaseOptions, DatabaseOptionsBuilder};
pub use provider::{ConnectionProvider, PooledConnection, PooledProvider};
pub use queue::DeferredTask;
pub use row::Row;
pub use statement::{Statement, StatementHook};
pub use timings::{DatabaseTiming, NullTiming, NullTimingsProvider, TimingsProvider};
pub use types::{IsolationLevel, RowValue};

/// Boxed future tied to a borrow, used by transaction callbacks and
/// deferred task actions.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
