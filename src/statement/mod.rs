//! Managed statement handle.
//!
//! A [`Statement`] owns one pooled connection for its whole lifetime and
//! exposes the prepare/execute/fetch/transaction surface over it. The
//! driver work runs on a dedicated worker thread (see [`worker`]); the
//! handle tracks the lifecycle flags, the transaction-dirty state, and the
//! commit/rollback hooks.
//!
//! Always close a statement when you are done with it; the convenience
//! methods on [`Database`](crate::database::Database) do this for you.
//! Dropping an unclosed handle still releases the connection (the worker
//! rolls back any open transaction first), but does so without waiting.

mod channel;
pub(crate) mod params;
mod worker;

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use deadpool_sqlite::Object;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::database::Database;
use crate::error::DbError;
use crate::provider::PooledConnection;
use crate::row::Row;
use crate::types::{IsolationLevel, RowValue};

use channel::{Command, Reply};
use params::convert_params;
use worker::{run_statement_worker, WorkerConfig};

/// Hook registered via [`Statement::on_commit`]/[`Statement::on_rollback`];
/// runs exactly once at the next transaction resolution point.
pub type StatementHook = Box<dyn FnOnce(&mut Statement) + Send + Sync>;

enum Resolution {
    Commit,
    Rollback,
}

/// Handle over one pooled connection and its active prepared statement.
pub struct Statement {
    db: Database,
    sender: Sender<Command>,
    query: String,
    prepared: bool,
    cursor_open: bool,
    columns: Option<Arc<Vec<String>>>,
    dirty: bool,
    closed: bool,
    on_commit: Vec<StatementHook>,
    on_rollback: Vec<StatementHook>,
}

impl Statement {
    /// Move `object` onto a fresh worker thread and return the handle.
    pub(crate) fn spawn(db: Database, object: PooledConnection) -> Result<Self, DbError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let object_id = Object::id(&object);
        let config = WorkerConfig {
            read_uncommitted: db.isolation_level() == IsolationLevel::ReadUncommitted,
        };
        let handle = Handle::try_current().ok();
        thread::Builder::new()
            .name(format!("statement-worker-{object_id}"))
            .spawn(move || {
                let runtime_guard = handle.as_ref().map(|h| h.enter());
                run_statement_worker(&object, &receiver, &config);
                drop(runtime_guard);
            })
            .map_err(|err| {
                DbError::ConnectionUnavailable(format!(
                    "failed to spawn statement worker thread: {err}"
                ))
            })?;

        Ok(Self {
            db,
            sender,
            query: String::new(),
            prepared: false,
            cursor_open: false,
            columns: None,
            dirty: false,
            closed: false,
            on_commit: Vec::new(),
            on_rollback: Vec::new(),
        })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, DbError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .map_err(|_| worker_gone())?;
        rx.await.map_err(|_| worker_gone())?
    }

    /// Prepare a new statement on this connection, replacing (and closing)
    /// any previously prepared statement and open cursor.
    ///
    /// # Errors
    /// Returns `DbError::Prepare` if the driver rejects the SQL; the
    /// statement is closed before the error is returned.
    pub async fn query(&mut self, sql: &str) -> Result<(), DbError> {
        let _timing = self.db.timing(&format!("query: {sql}"));
        self.query = sql.to_string();
        self.prepared = false;
        self.cursor_open = false;
        self.columns = None;
        let sql = sql.to_string();
        match self
            .request(|respond_to| Command::Prepare { sql, respond_to })
            .await
        {
            Ok(()) => {
                self.prepared = true;
                Ok(())
            }
            Err(err) => {
                self.close().await;
                Err(err)
            }
        }
    }

    /// Bind `params` positionally and run the prepared statement as a
    /// row-returning query. The result's column labels are captured once
    /// and shared by every row fetched afterwards.
    ///
    /// # Errors
    /// Returns `DbError::NoActiveStatement` when called before [`query`],
    /// or `DbError::Execution` on a driver error (the statement is closed
    /// first).
    ///
    /// [`query`]: Statement::query
    pub async fn execute(&mut self, params: &[RowValue]) -> Result<(), DbError> {
        let _timing = self.db.timing(&format!("execute: {}", self.query));
        if !self.prepared {
            return Err(DbError::NoActiveStatement);
        }
        let values = convert_params(params);
        match self
            .request(|respond_to| Command::Execute {
                params: values,
                respond_to,
            })
            .await
        {
            Ok(columns) => {
                self.cursor_open = true;
                self.columns = Some(columns);
                Ok(())
            }
            Err(err) => {
                self.close().await;
                Err(err)
            }
        }
    }

    /// Bind `params` positionally and run the prepared statement as a
    /// mutation, returning the number of affected rows.
    ///
    /// Outside a transaction this is an implicit resolution point: success
    /// fires the on-commit hooks, failure fires the on-rollback hooks, and
    /// both lists are cleared either way.
    ///
    /// # Errors
    /// Returns `DbError::NoActiveStatement` when called before [`query`],
    /// or `DbError::Execution` on a driver error (hooks fire, then the
    /// statement is closed).
    ///
    /// [`query`]: Statement::query
    pub async fn execute_update(&mut self, params: &[RowValue]) -> Result<usize, DbError> {
        let _timing = self.db.timing(&format!("execute_update: {}", self.query));
        if !self.prepared {
            return Err(DbError::NoActiveStatement);
        }
        let values = convert_params(params);
        match self
            .request(|respond_to| Command::ExecuteUpdate {
                params: values,
                respond_to,
            })
            .await
        {
            Ok(affected) => {
                if !self.dirty {
                    self.run_hooks(Resolution::Commit);
                }
                Ok(affected)
            }
            Err(err) => {
                if !self.dirty {
                    self.run_hooks(Resolution::Rollback);
                }
                self.close().await;
                Err(err)
            }
        }
    }

    /// Fetch the next row, or `None` when the cursor is exhausted (the
    /// cursor is released) or no cursor is open.
    ///
    /// # Errors
    /// Returns `DbError::Execution` if stepping the cursor fails.
    pub async fn next_row(&mut self) -> Result<Option<Row>, DbError> {
        if self.closed || !self.cursor_open {
            return Ok(None);
        }
        let result = self
            .request(|respond_to| Command::NextRow { respond_to })
            .await;
        if !matches!(result, Ok(Some(_))) {
            self.cursor_open = false;
        }
        result
    }

    /// Advance the cursor and return the first column of the next row, or
    /// `None` when exhausted.
    ///
    /// # Errors
    /// Returns `DbError::Execution` if stepping the cursor fails.
    pub async fn first_column(&mut self) -> Result<Option<RowValue>, DbError> {
        if self.closed || !self.cursor_open {
            return Ok(None);
        }
        let result = self
            .request(|respond_to| Command::FirstColumn { respond_to })
            .await;
        if !matches!(result, Ok(Some(_))) {
            self.cursor_open = false;
        }
        result
    }

    /// Drain the open cursor into a vector. Returns `None` when no cursor
    /// is open, which distinguishes "no query executed" from an empty
    /// result.
    ///
    /// # Errors
    /// Returns `DbError::Execution` if stepping the cursor fails.
    pub async fn results(&mut self) -> Result<Option<Vec<Row>>, DbError> {
        if !self.cursor_open {
            return Ok(None);
        }
        let _timing = self.db.timing("results");
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(Some(rows))
    }

    /// Rowid generated by the most recent insert on this connection, or
    /// `None` when the driver reports none.
    ///
    /// # Errors
    /// Returns `DbError::ConnectionUnavailable` if the worker is gone.
    pub async fn last_insert_id(&mut self) -> Result<Option<i64>, DbError> {
        let _timing = self.db.timing("last_insert_id");
        self.request(|respond_to| Command::LastInsertId { respond_to })
            .await
    }

    /// Begin an explicit transaction and mark the statement dirty.
    /// Beginning twice without resolving is a driver error, left to caller
    /// discipline.
    ///
    /// # Errors
    /// Returns the driver error if `BEGIN` fails.
    pub async fn start_transaction(&mut self) -> Result<(), DbError> {
        let _timing = self.db.timing("start_transaction");
        self.request(|respond_to| Command::Begin { respond_to })
            .await?;
        self.dirty = true;
        Ok(())
    }

    /// Commit the pending transaction. No-op when not dirty; on success the
    /// on-commit hooks run once and both hook lists are cleared.
    ///
    /// # Errors
    /// Returns the driver error if `COMMIT` fails; hooks do not run.
    pub async fn commit(&mut self) -> Result<(), DbError> {
        if !self.dirty {
            return Ok(());
        }
        let _timing = self.db.timing("commit");
        self.dirty = false;
        self.request(|respond_to| Command::Commit { respond_to })
            .await?;
        self.run_hooks(Resolution::Commit);
        Ok(())
    }

    /// Roll back the pending transaction. No-op when not dirty; on success
    /// the on-rollback hooks run once and both hook lists are cleared.
    ///
    /// # Errors
    /// Returns the driver error if `ROLLBACK` fails; hooks do not run.
    pub async fn rollback(&mut self) -> Result<(), DbError> {
        if !self.dirty {
            return Ok(());
        }
        let _timing = self.db.timing("rollback");
        self.dirty = false;
        self.request(|respond_to| Command::Rollback { respond_to })
            .await?;
        self.run_hooks(Resolution::Rollback);
        Ok(())
    }

    /// Whether a transaction has begun and not yet resolved.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.dirty
    }

    /// Run `hook` once at the next successful resolution: an explicit
    /// commit, or the implicit success of a non-transactional
    /// `execute_update`.
    pub fn on_commit(&mut self, hook: impl FnOnce(&mut Statement) + Send + Sync + 'static) {
        self.on_commit.push(Box::new(hook));
    }

    /// Run `hook` once at the next rollback resolution, including the
    /// implicit failure of a non-transactional `execute_update`. No
    /// guarantee is made about the connection state when it runs.
    pub fn on_rollback(&mut self, hook: impl FnOnce(&mut Statement) + Send + Sync + 'static) {
        self.on_rollback.push(Box::new(hook));
    }

    fn run_hooks(&mut self, resolution: Resolution) {
        let selected = match resolution {
            Resolution::Commit => {
                self.on_rollback.clear();
                std::mem::take(&mut self.on_commit)
            }
            Resolution::Rollback => {
                self.on_commit.clear();
                std::mem::take(&mut self.on_rollback)
            }
        };
        for hook in selected {
            hook(self);
        }
    }

    /// SQL text of the most recently prepared statement.
    #[must_use]
    pub fn last_query(&self) -> &str {
        &self.query
    }

    /// Column labels captured by the most recent [`execute`](Statement::execute).
    #[must_use]
    pub fn column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.columns.as_ref()
    }

    /// Close the statement and release its connection back to the pool.
    ///
    /// Safe to call any number of times. A still-dirty statement is logged
    /// as an error and rolled back (firing the rollback hooks) before the
    /// connection is released.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        let _timing = self.db.timing("close");
        if self.dirty {
            tracing::error!("statement was not finalized: {}", self.query);
            if let Err(err) = self.rollback().await {
                tracing::error!("rollback during close failed: {err}");
            }
        }
        self.closed = true;
        self.prepared = false;
        self.cursor_open = false;
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(Command::Close { respond_to: tx })
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Whether the connection has been released (or the worker is gone).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort: the worker rolls back any open transaction and
            // returns the connection on its own.
            let _ = self.sender.send(Command::Shutdown);
        }
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("query", &self.query)
            .field("prepared", &self.prepared)
            .field("cursor_open", &self.cursor_open)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

fn worker_gone() -> DbError {
    DbError::ConnectionUnavailable("statement worker closed".into())
}
