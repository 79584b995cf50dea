//! Deferred single-consumer work queue.
//!
//! Tasks are immutable descriptors pushed onto an unbounded channel from
//! any thread; a drain pops them in FIFO order and runs each against one
//! shared [`Statement`]. A descriptor leaves the queue exactly once, which
//! is what makes task execution one-shot. Only one drain runs at a time:
//! the receiver sits behind a `try_lock`, and a concurrent trigger that
//! loses the race simply returns, relying on the in-progress drain to
//! finish everything already enqueued.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::database::Database;
use crate::error::DbError;
use crate::statement::Statement;
use crate::types::RowValue;
use crate::BoxFuture;

/// Action run against the drain's statement.
pub type TaskAction =
    Box<dyn for<'a> FnOnce(&'a mut Statement) -> BoxFuture<'a, Result<(), DbError>> + Send>;

/// Error handler for one task; the default logs and moves on.
pub type TaskErrorHandler = Box<dyn FnOnce(DbError) + Send>;

/// One deferred unit of work.
///
/// If built with an associated query, that query is prepared on the
/// statement immediately before the action runs.
pub struct DeferredTask {
    query: Option<String>,
    run: TaskAction,
    on_error: TaskErrorHandler,
}

impl DeferredTask {
    /// Task with no associated query; the action does its own preparation.
    pub fn new<F>(run: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut Statement) -> BoxFuture<'a, Result<(), DbError>>
            + Send
            + 'static,
    {
        Self {
            query: None,
            run: Box::new(run),
            on_error: default_error_handler(None),
        }
    }

    /// Task whose `query` is prepared on the statement before `run`.
    pub fn with_query<F>(query: impl Into<String>, run: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut Statement) -> BoxFuture<'a, Result<(), DbError>>
            + Send
            + 'static,
    {
        let query = query.into();
        let on_error = default_error_handler(Some(query.clone()));
        Self {
            query: Some(query),
            run: Box::new(run),
            on_error,
        }
    }

    /// Replace the default logging error handler.
    #[must_use]
    pub fn on_error(mut self, handler: impl FnOnce(DbError) + Send + 'static) -> Self {
        self.on_error = Box::new(handler);
        self
    }
}

fn default_error_handler(query: Option<String>) -> TaskErrorHandler {
    Box::new(move |err| match query {
        Some(query) => tracing::error!("deferred task for `{query}` failed: {err}"),
        None => tracing::error!("deferred task failed: {err}"),
    })
}

impl std::fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredTask")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

pub(crate) struct DeferredQueue {
    sender: UnboundedSender<DeferredTask>,
    receiver: Mutex<UnboundedReceiver<DeferredTask>>,
}

impl DeferredQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }
}

impl Database {
    /// Enqueue a deferred task. Safe from any thread and never blocks.
    /// Returns false if the queue is gone (the database was dropped).
    pub fn enqueue(&self, task: DeferredTask) -> bool {
        self.inner.queue.sender.send(task).is_ok()
    }

    /// Enqueue a fire-and-forget update; failures go to the default
    /// logging handler.
    pub fn queue_update(&self, query: &str, params: &[RowValue]) -> bool {
        let params = params.to_vec();
        self.enqueue(DeferredTask::with_query(
            query,
            move |statement: &mut Statement| run_queued_update(statement, params),
        ))
    }

    /// Drain every task currently queued.
    ///
    /// No-op when another drain is in progress or the queue is empty.
    /// The drain owns one statement for the whole batch, re-opening it if a
    /// task's failure closed it; per-task errors go to that task's handler
    /// and do not abort the drain.
    pub async fn process_queue(&self) {
        let Ok(mut receiver) = self.inner.queue.receiver.try_lock() else {
            return;
        };
        if receiver.is_empty() {
            return;
        }

        let mut statement = match self.create_statement().await {
            Ok(statement) => statement,
            Err(err) => {
                tracing::error!("failed to open statement for deferred queue: {err}");
                return;
            }
        };

        while let Ok(task) = receiver.try_recv() {
            let DeferredTask {
                query,
                run,
                on_error,
            } = task;
            if statement.is_closed() {
                statement = match self.create_statement().await {
                    Ok(statement) => statement,
                    Err(err) => {
                        on_error(err);
                        continue;
                    }
                };
            }
            if let Err(err) = run_task(&mut statement, query, run).await {
                on_error(err);
            }
        }

        statement.close().await;
    }
}

async fn run_task(
    statement: &mut Statement,
    query: Option<String>,
    run: TaskAction,
) -> Result<(), DbError> {
    if let Some(sql) = query {
        statement.query(&sql).await?;
    }
    run(statement).await
}

fn run_queued_update(
    statement: &mut Statement,
    params: Vec<RowValue>,
) -> BoxFuture<'_, Result<(), DbError>> {
    Box::pin(async move {
        statement.execute_update(&params).await?;
        Ok(())
    })
}
