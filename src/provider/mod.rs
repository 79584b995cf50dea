//! Connection acquisition capability.
//!
//! The core never talks to a pool directly: it asks a [`ConnectionProvider`]
//! for an owned pooled connection and lets the object's `Drop` return it.
//! The stock implementation is [`PooledProvider`] over `deadpool-sqlite`;
//! tests and embedders can inject their own.

mod pooled;

pub use pooled::PooledProvider;

use async_trait::async_trait;

use crate::error::DbError;

/// An owned pooled connection. Dropping it returns the underlying
/// connection to its pool.
pub type PooledConnection = deadpool_sqlite::Object;

/// Capability that supplies pooled connections.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Acquire a connection, waiting up to the provider's own timeout.
    ///
    /// # Errors
    /// Returns `DbError::Pool` or `DbError::ConnectionUnavailable` when no
    /// connection can be supplied.
    async fn acquire(&self) -> Result<PooledConnection, DbError>;

    /// Stop handing out connections and release pooled resources.
    fn shutdown(&self);
}
