use std::sync::Arc;

use deadpool_sqlite::rusqlite;
use tokio::sync::oneshot;

use crate::error::DbError;
use crate::row::Row;
use crate::types::RowValue;

pub(super) type Reply<T> = oneshot::Sender<Result<T, DbError>>;

/// Commands routed from a [`Statement`](super::Statement) handle to the
/// worker thread that owns its connection. Each command carries its own
/// reply channel; the worker never initiates communication.
pub(super) enum Command {
    Prepare {
        sql: String,
        respond_to: Reply<()>,
    },
    Execute {
        params: Vec<rusqlite::types::Value>,
        respond_to: Reply<Arc<Vec<String>>>,
    },
    ExecuteUpdate {
        params: Vec<rusqlite::types::Value>,
        respond_to: Reply<usize>,
    },
    NextRow {
        respond_to: Reply<Option<Row>>,
    },
    FirstColumn {
        respond_to: Reply<Option<RowValue>>,
    },
    LastInsertId {
        respond_to: Reply<Option<i64>>,
    },
    Begin {
        respond_to: Reply<()>,
    },
    Commit {
        respond_to: Reply<()>,
    },
    Rollback {
        respond_to: Reply<()>,
    },
    /// Orderly close: acknowledged after the connection is back in a
    /// poolable state.
    Close {
        respond_to: oneshot::Sender<()>,
    },
    /// Best-effort close sent from `Drop`; no acknowledgement.
    Shutdown,
}
