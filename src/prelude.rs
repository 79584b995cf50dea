//! Convenient imports for common functionality.
//!
//! Re-exports the types most callers touch so one `use` line is enough to
//! get started.

pub use crate::database::{Database, DbFuture, TransactionOutcome};
pub use crate::error::DbError;
pub use crate::options::{DatabaseOptions, DatabaseOptionsBuilder};
pub use crate::provider::{ConnectionProvider, PooledProvider};
pub use crate::queue::DeferredTask;
pub use crate::row::Row;
pub use crate::statement::Statement;
pub use crate::timings::{DatabaseTiming, NullTimingsProvider, TimingsProvider};
pub use crate::types::{IsolationLevel, RowValue};
pub use crate::BoxFuture;
