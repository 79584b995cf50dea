//! Future-returning dispatch path.
//!
//! [`Database::dispatch_async`] hands a unit of work to the runtime (or
//! runs it inline when none is configured) and returns a [`DbFuture`] that
//! completes with the work's result. Errors are never dropped: a vanished
//! task completes the future with `DbError::Dispatch`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::DbError;
use crate::row::Row;
use crate::statement::Statement;
use crate::types::RowValue;

use super::Database;

/// Completion handle for a dispatched unit of work.
///
/// Await it from async code, or call [`wait`](DbFuture::wait) from a
/// synchronous thread.
pub struct DbFuture<T> {
    rx: oneshot::Receiver<Result<T, DbError>>,
}

impl<T> DbFuture<T> {
    /// Block the current (non-runtime) thread until the result arrives.
    ///
    /// # Errors
    /// Returns the task's error, or `DbError::Dispatch` if the task was
    /// dropped before completing.
    pub fn wait(self) -> Result<T, DbError> {
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(task_dropped()))
    }
}

impl<T> Future for DbFuture<T> {
    type Output = Result<T, DbError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(task_dropped())))
    }
}

fn task_dropped() -> DbError {
    DbError::Dispatch("task dropped before completing".into())
}

impl Database {
    /// Submit `task` for execution off the caller. With a runtime handle
    /// the task is spawned and this never blocks; with none, the task runs
    /// inline on a throwaway current-thread runtime and the caller bears
    /// the cost.
    pub fn dispatch_async<T, F>(&self, task: F) -> DbFuture<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, DbError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        match self.runtime() {
            Some(handle) => {
                handle.spawn(async move {
                    let _ = tx.send(task.await);
                });
            }
            None => {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => {
                        let _ = tx.send(runtime.block_on(task));
                    }
                    Err(err) => {
                        let _ = tx.send(Err(DbError::Dispatch(format!(
                            "failed to build inline runtime: {err}"
                        ))));
                    }
                }
            }
        }
        DbFuture { rx }
    }

    /// Future-returning counterpart of [`Database::query`]. The statement
    /// must still be closed by whoever ends up holding it.
    pub fn query_async(&self, query: &str) -> DbFuture<Statement> {
        let db = self.clone();
        let query = query.to_owned();
        self.dispatch_async(async move { db.query(&query).await })
    }

    /// Future-returning counterpart of [`Database::get_first_row`].
    pub fn get_first_row_async(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> DbFuture<Option<Row>> {
        let db = self.clone();
        let query = query.to_owned();
        let params = params.to_vec();
        self.dispatch_async(async move { db.get_first_row(&query, &params).await })
    }

    /// Future-returning counterpart of [`Database::get_first_column`].
    pub fn get_first_column_async(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> DbFuture<Option<RowValue>> {
        let db = self.clone();
        let query = query.to_owned();
        let params = params.to_vec();
        self.dispatch_async(async move { db.get_first_column(&query, &params).await })
    }

    /// Future-returning counterpart of
    /// [`Database::get_first_column_results`].
    pub fn get_first_column_results_async(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> DbFuture<Vec<RowValue>> {
        let db = self.clone();
        let query = query.to_owned();
        let params = params.to_vec();
        self.dispatch_async(async move { db.get_first_column_results(&query, &params).await })
    }

    /// Future-returning counterpart of [`Database::get_results`].
    pub fn get_results_async(&self, query: &str, params: &[RowValue]) -> DbFuture<Vec<Row>> {
        let db = self.clone();
        let query = query.to_owned();
        let params = params.to_vec();
        self.dispatch_async(async move { db.get_results(&query, &params).await })
    }

    /// Future-returning counterpart of [`Database::execute_insert`].
    pub fn execute_insert_async(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> DbFuture<Option<i64>> {
        let db = self.clone();
        let query = query.to_owned();
        let params = params.to_vec();
        self.dispatch_async(async move { db.execute_insert(&query, &params).await })
    }

    /// Future-returning counterpart of [`Database::execute_update`].
    pub fn execute_update_async(&self, query: &str, params: &[RowValue]) -> DbFuture<usize> {
        let db = self.clone();
        let query = query.to_owned();
        let params = params.to_vec();
        self.dispatch_async(async move { db.execute_update(&query, &params).await })
    }
}
