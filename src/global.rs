//! Optional process-wide database registry.
//!
//! A thin convenience layer over one shared [`Database`]; the core takes
//! explicit instances, so nothing in this crate depends on the registry.
//! Install with [`set_global`] during startup and tear down with
//! [`close_global`].

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use lazy_static::lazy_static;

use crate::database::Database;
use crate::error::DbError;
use crate::row::Row;
use crate::types::RowValue;

lazy_static! {
    static ref GLOBAL_DATABASE: RwLock<Option<Database>> = RwLock::new(None);
}

/// Install `database` as the process-wide instance, replacing any prior
/// one.
pub fn set_global(database: Database) {
    let mut slot = GLOBAL_DATABASE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = Some(database);
}

/// The process-wide instance, if one was installed.
#[must_use]
pub fn try_global() -> Option<Database> {
    GLOBAL_DATABASE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Remove and return the process-wide instance.
#[must_use]
pub fn take_global() -> Option<Database> {
    GLOBAL_DATABASE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

/// Tear down the process-wide instance with the default drain budget.
pub async fn close_global_default() {
    close_global(Duration::from_secs(120)).await;
}

/// Tear down the process-wide instance, draining its deferred queue within
/// `timeout`.
pub async fn close_global(timeout: Duration) {
    if let Some(database) = take_global() {
        database.close(timeout).await;
    }
}

fn require_global() -> Result<Database, DbError> {
    try_global().ok_or_else(|| DbError::Config("global database not initialized".into()))
}

/// [`Database::get_first_row`] against the global instance.
///
/// # Errors
/// Returns `DbError::Config` when no global database is installed, plus
/// the delegated operation's errors.
pub async fn get_first_row(query: &str, params: &[RowValue]) -> Result<Option<Row>, DbError> {
    require_global()?.get_first_row(query, params).await
}

/// [`Database::get_first_column`] against the global instance.
///
/// # Errors
/// See [`get_first_row`].
pub async fn get_first_column(
    query: &str,
    params: &[RowValue],
) -> Result<Option<RowValue>, DbError> {
    require_global()?.get_first_column(query, params).await
}

/// [`Database::get_first_column_results`] against the global instance.
///
/// # Errors
/// See [`get_first_row`].
pub async fn get_first_column_results(
    query: &str,
    params: &[RowValue],
) -> Result<Vec<RowValue>, DbError> {
    require_global()?
        .get_first_column_results(query, params)
        .await
}

/// [`Database::get_results`] against the global instance.
///
/// # Errors
/// See [`get_first_row`].
pub async fn get_results(query: &str, params: &[RowValue]) -> Result<Vec<Row>, DbError> {
    require_global()?.get_results(query, params).await
}

/// [`Database::execute_insert`] against the global instance.
///
/// # Errors
/// See [`get_first_row`].
pub async fn execute_insert(
    query: &str,
    params: &[RowValue],
) -> Result<Option<i64>, DbError> {
    require_global()?.execute_insert(query, params).await
}

/// [`Database::execute_update`] against the global instance.
///
/// # Errors
/// See [`get_first_row`].
pub async fn execute_update(query: &str, params: &[RowValue]) -> Result<usize, DbError> {
    require_global()?.execute_update(query, params).await
}
