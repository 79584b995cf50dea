//! Database facade: owns the connection provider, the deferred queue, and
//! the timing/logging capabilities, and exposes the one-shot query helpers.
//!
//! Every convenience method is the same strict composition: open a
//! [`Statement`], run one query to completion, close the statement — with
//! the close guaranteed on every path, including errors.

pub(crate) mod dispatch;
mod transaction;

pub use dispatch::DbFuture;
pub use transaction::TransactionOutcome;

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::DbError;
use crate::options::DatabaseOptions;
use crate::provider::{ConnectionProvider, PooledProvider};
use crate::queue::DeferredQueue;
use crate::row::Row;
use crate::statement::Statement;
use crate::timings::TimingGuard;
use crate::types::{IsolationLevel, RowValue};

/// Handle to one configured database. Cheap to clone; all clones share the
/// same pool, deferred queue, and capabilities.
#[derive(Clone)]
pub struct Database {
    pub(crate) inner: Arc<DatabaseInner>,
}

pub(crate) struct DatabaseInner {
    pub(crate) provider: Arc<dyn ConnectionProvider>,
    pub(crate) options: DatabaseOptions,
    pub(crate) runtime: Option<Handle>,
    pub(crate) queue: DeferredQueue,
    drain_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Database {
    /// Build the pooled provider described by `options` and open the
    /// database. Initialization failures are reported to the configured
    /// fatal-error handler before being returned.
    ///
    /// # Errors
    /// Returns `DbError` if the pool cannot be built or the initial pragma
    /// batch fails.
    pub async fn open(options: DatabaseOptions) -> Result<Self, DbError> {
        if options.display_connect_info {
            tracing::info!("connecting to database: {}", options.path);
        }
        let provider = match PooledProvider::new(&options).await {
            Ok(provider) => Arc::new(provider),
            Err(err) => {
                (options.on_fatal_error)(&err);
                return Err(err);
            }
        };
        Ok(Self::with_provider(provider, options))
    }

    /// Open a database over an injected [`ConnectionProvider`].
    #[must_use]
    pub fn with_provider(
        provider: Arc<dyn ConnectionProvider>,
        options: DatabaseOptions,
    ) -> Self {
        let db = Self {
            inner: Arc::new(DatabaseInner {
                provider,
                options,
                runtime: Handle::try_current().ok(),
                queue: DeferredQueue::new(),
                drain_task: StdMutex::new(None),
            }),
        };
        db.spawn_drain_task();
        db
    }

    /// Periodic drain of the deferred queue; only runs when a runtime is
    /// available. Holds a weak reference so an abandoned `Database` can
    /// still be dropped.
    fn spawn_drain_task(&self) {
        let Some(handle) = self.inner.runtime.clone() else {
            return;
        };
        let weak: Weak<DatabaseInner> = Arc::downgrade(&self.inner);
        let interval = self.inner.options.queue_poll_interval;
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                Database { inner }.process_queue().await;
            }
        });
        if let Ok(mut slot) = self.inner.drain_task.lock() {
            *slot = Some(task);
        }
    }

    #[must_use]
    pub fn options(&self) -> &DatabaseOptions {
        &self.inner.options
    }

    pub(crate) fn isolation_level(&self) -> IsolationLevel {
        self.inner.options.isolation_level
    }

    pub(crate) fn runtime(&self) -> Option<Handle> {
        self.inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    /// Start a named timing span under this database's pool name.
    pub(crate) fn timing(&self, name: &str) -> TimingGuard {
        let label = format!("{} - {name}", self.inner.options.pool_name);
        TimingGuard::start(self.inner.options.timings.of(&label))
    }

    /// Report `err` to the configured fatal-error handler.
    pub fn fatal_error(&self, err: &DbError) {
        (self.inner.options.on_fatal_error)(err);
    }

    /// Open a new [`Statement`]. The caller must close it.
    ///
    /// # Errors
    /// Returns a pool error when no connection is available; the error is
    /// also reported to the fatal-error handler.
    pub async fn create_statement(&self) -> Result<Statement, DbError> {
        let object = match self.inner.provider.acquire().await {
            Ok(object) => object,
            Err(err) => {
                self.fatal_error(&err);
                return Err(err);
            }
        };
        Statement::spawn(self.clone(), object)
    }

    /// Open a new [`Statement`] and prepare `sql` on it. The caller must
    /// close it.
    ///
    /// # Errors
    /// Returns `DbError::Prepare` (statement already closed) if the driver
    /// rejects the SQL.
    pub async fn query(&self, sql: &str) -> Result<Statement, DbError> {
        let mut statement = self.create_statement().await?;
        match statement.query(sql).await {
            Ok(()) => Ok(statement),
            Err(err) => {
                statement.close().await;
                Err(err)
            }
        }
    }

    /// Run `query` and return the first row, closing the statement before
    /// returning. Prefer single-row queries here.
    ///
    /// # Errors
    /// Propagates prepare/execution errors.
    pub async fn get_first_row(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> Result<Option<Row>, DbError> {
        let mut statement = self.query(query).await?;
        let result = async {
            statement.execute(params).await?;
            statement.next_row().await
        }
        .await;
        statement.close().await;
        result
    }

    /// Run `query` and return the first column of the first row.
    ///
    /// # Errors
    /// Propagates prepare/execution errors.
    pub async fn get_first_column(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> Result<Option<RowValue>, DbError> {
        let mut statement = self.query(query).await?;
        let result = async {
            statement.execute(params).await?;
            statement.first_column().await
        }
        .await;
        statement.close().await;
        result
    }

    /// Run `query` and return the first column of every row, in result
    /// order.
    ///
    /// # Errors
    /// Propagates prepare/execution errors.
    pub async fn get_first_column_results(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> Result<Vec<RowValue>, DbError> {
        let mut statement = self.query(query).await?;
        let mut values = Vec::new();
        let result = async {
            statement.execute(params).await?;
            while let Some(value) = statement.first_column().await? {
                values.push(value);
            }
            Ok(())
        }
        .await;
        statement.close().await;
        result.map(|()| values)
    }

    /// Run `query` and return every row.
    ///
    /// # Errors
    /// Propagates prepare/execution errors.
    pub async fn get_results(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> Result<Vec<Row>, DbError> {
        let mut statement = self.query(query).await?;
        let result = async {
            statement.execute(params).await?;
            statement.results().await
        }
        .await;
        statement.close().await;
        result.map(Option::unwrap_or_default)
    }

    /// Run an insert and return the generated row id, or `None` when no
    /// row was inserted.
    ///
    /// # Errors
    /// Propagates prepare/execution errors.
    pub async fn execute_insert(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> Result<Option<i64>, DbError> {
        let mut statement = self.query(query).await?;
        let result = async {
            let affected = statement.execute_update(params).await?;
            if affected > 0 {
                statement.last_insert_id().await
            } else {
                Ok(None)
            }
        }
        .await;
        statement.close().await;
        result
    }

    /// Run a mutation and return the number of affected rows.
    ///
    /// # Errors
    /// Propagates prepare/execution errors.
    pub async fn execute_update(
        &self,
        query: &str,
        params: &[RowValue],
    ) -> Result<usize, DbError> {
        let mut statement = self.query(query).await?;
        let result = statement.execute_update(params).await;
        statement.close().await;
        result
    }

    /// Tear down with the default 120 second drain budget.
    pub async fn close_default(&self) {
        self.close(Duration::from_secs(120)).await;
    }

    /// Drain the deferred queue (bounded by `timeout`), stop the periodic
    /// drain task, and close the pool. Proceeds regardless once the
    /// timeout elapses.
    pub async fn close(&self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.process_queue())
            .await
            .is_err()
        {
            tracing::warn!(
                "deferred queue did not drain within {timeout:?}; closing anyway"
            );
        }
        let task = match self.inner.drain_task.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            task.abort();
        }
        self.inner.provider.shutdown();
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}
