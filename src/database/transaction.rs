//! Transaction helper built on [`Statement`]'s state machine.
//!
//! The callback decides the outcome with a value rather than a raised
//! error: return [`TransactionOutcome::Commit`] or
//! [`TransactionOutcome::Rollback`]; an `Err` is treated exactly like a
//! rollback decision plus a log line.

use crate::error::DbError;
use crate::statement::Statement;
use crate::BoxFuture;

use super::{Database, DbFuture};

/// Decision returned by a transaction callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Commit,
    Rollback,
}

impl Database {
    /// Open a statement, begin a transaction, and run `callback` inside it.
    ///
    /// Commits when the callback returns `Ok(Commit)` and the commit
    /// succeeds; rolls back otherwise. Returns whether the transaction
    /// committed. Callback and commit errors are logged and swallowed, not
    /// re-raised. The statement is closed on every path.
    pub async fn create_transaction<F>(&self, callback: F) -> bool
    where
        F: for<'a> FnOnce(&'a mut Statement) -> BoxFuture<'a, Result<TransactionOutcome, DbError>>
            + Send,
    {
        let mut statement = match self.create_statement().await {
            Ok(statement) => statement,
            Err(err) => {
                tracing::error!("failed to open transaction statement: {err}");
                return false;
            }
        };
        let committed = run_transaction(&mut statement, callback).await;
        statement.close().await;
        committed
    }

    /// Dispatch [`create_transaction`](Database::create_transaction) off
    /// the caller. `on_success`/`on_fail` run after resolution, on the
    /// dispatched task.
    pub fn create_transaction_async<F>(
        &self,
        callback: F,
        on_success: Option<Box<dyn FnOnce() + Send>>,
        on_fail: Option<Box<dyn FnOnce() + Send>>,
    ) -> DbFuture<bool>
    where
        F: for<'a> FnOnce(&'a mut Statement) -> BoxFuture<'a, Result<TransactionOutcome, DbError>>
            + Send
            + 'static,
    {
        let db = self.clone();
        self.dispatch_async(async move {
            let committed = db.create_transaction(callback).await;
            if committed {
                if let Some(hook) = on_success {
                    hook();
                }
            } else if let Some(hook) = on_fail {
                hook();
            }
            Ok(committed)
        })
    }
}

async fn run_transaction<F>(statement: &mut Statement, callback: F) -> bool
where
    F: for<'a> FnOnce(&'a mut Statement) -> BoxFuture<'a, Result<TransactionOutcome, DbError>>
        + Send,
{
    if let Err(err) = statement.start_transaction().await {
        tracing::error!("failed to begin transaction: {err}");
        return false;
    }
    match callback(statement).await {
        Ok(TransactionOutcome::Commit) => match statement.commit().await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("commit failed: {err}");
                rollback_quietly(statement).await;
                false
            }
        },
        Ok(TransactionOutcome::Rollback) => {
            rollback_quietly(statement).await;
            false
        }
        Err(err) => {
            tracing::error!("transaction callback failed: {err}");
            rollback_quietly(statement).await;
            false
        }
    }
}

async fn rollback_quietly(statement: &mut Statement) {
    if let Err(err) = statement.rollback().await {
        tracing::error!("rollback failed: {err}");
    }
}
