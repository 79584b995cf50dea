//! Worker-thread side of a [`Statement`](super::Statement).
//!
//! `rusqlite` connections, prepared statements, and row cursors borrow each
//! other and are `!Send`, so the worker keeps all three in nested loop
//! frames: the base loop owns the connection, `prepared_loop` owns the
//! active prepared statement, and `cursor_loop` owns the open row cursor.
//! A command the current loop cannot answer bubbles outward, which drops
//! the inner state (closing the cursor or statement) before the command is
//! retried one level up. Those nested loops are the statement lifecycle
//! state machine.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use deadpool_sqlite::rusqlite;

use crate::error::DbError;
use crate::provider::PooledConnection;
use crate::row::Row;

use super::channel::Command;
use super::params::extract_value;

pub(super) struct WorkerConfig {
    pub(super) read_uncommitted: bool,
}

pub(super) fn run_statement_worker(
    object: &PooledConnection,
    receiver: &Receiver<Command>,
    config: &WorkerConfig,
) {
    let conn_guard = match object.lock() {
        Ok(guard) => guard,
        Err(err) => {
            tracing::error!("sqlite connection mutex poisoned: {err}");
            return;
        }
    };
    let conn: &rusqlite::Connection = &conn_guard;

    if config.read_uncommitted
        && let Err(err) = conn.execute_batch("PRAGMA read_uncommitted = 1;")
    {
        tracing::warn!("failed to enable read_uncommitted: {err}");
    }

    let mut finalized = false;
    let mut pending: Option<Command> = None;
    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };
        match command {
            Command::Prepare { sql, respond_to } => match conn.prepare(&sql) {
                Ok(stmt) => {
                    let _ = respond_to.send(Ok(()));
                    pending = prepared_loop(conn, stmt, &sql, receiver);
                }
                Err(source) => {
                    let _ = respond_to.send(Err(DbError::Prepare { query: sql, source }));
                }
            },
            Command::Execute { respond_to, .. } => {
                let _ = respond_to.send(Err(DbError::NoActiveStatement));
            }
            Command::ExecuteUpdate { respond_to, .. } => {
                let _ = respond_to.send(Err(DbError::NoActiveStatement));
            }
            Command::NextRow { respond_to } => {
                let _ = respond_to.send(Ok(None));
            }
            Command::FirstColumn { respond_to } => {
                let _ = respond_to.send(Ok(None));
            }
            Command::LastInsertId { respond_to } => {
                let _ = respond_to.send(Ok(last_insert_id(conn)));
            }
            Command::Begin { respond_to } => {
                let _ = respond_to.send(run_tx_statement(conn, "BEGIN"));
            }
            Command::Commit { respond_to } => {
                let _ = respond_to.send(run_tx_statement(conn, "COMMIT"));
            }
            Command::Rollback { respond_to } => {
                let _ = respond_to.send(run_tx_statement(conn, "ROLLBACK"));
            }
            Command::Close { respond_to } => {
                finalize(conn);
                finalized = true;
                let _ = respond_to.send(());
                break;
            }
            Command::Shutdown => break,
        }
    }

    if !finalized {
        finalize(conn);
    }
    // conn_guard drops here; the pooled object is released by the caller.
}

/// Loop held while a prepared statement is active. Returns a command that
/// must be handled by the base loop (`Prepare`, `Close`, `Shutdown`), or
/// `None` when the command channel is gone.
fn prepared_loop(
    conn: &rusqlite::Connection,
    mut stmt: rusqlite::Statement<'_>,
    sql: &str,
    receiver: &Receiver<Command>,
) -> Option<Command> {
    let mut pending: Option<Command> = None;
    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => return None,
            },
        };
        match command {
            Command::Execute { params, respond_to } => {
                let columns: Arc<Vec<String>> = Arc::new(
                    stmt.column_names()
                        .iter()
                        .map(|name| (*name).to_string())
                        .collect(),
                );
                match stmt.query(rusqlite::params_from_iter(params)) {
                    Ok(rows) => {
                        let _ = respond_to.send(Ok(Arc::clone(&columns)));
                        pending = cursor_loop(rows, &columns, sql, receiver);
                    }
                    Err(source) => {
                        let _ = respond_to.send(Err(execution_error(sql, source)));
                    }
                }
            }
            Command::ExecuteUpdate { params, respond_to } => {
                let result = stmt
                    .execute(rusqlite::params_from_iter(params))
                    .map_err(|source| execution_error(sql, source));
                let _ = respond_to.send(result);
            }
            Command::NextRow { respond_to } => {
                // No cursor is open at this level.
                let _ = respond_to.send(Ok(None));
            }
            Command::FirstColumn { respond_to } => {
                let _ = respond_to.send(Ok(None));
            }
            Command::LastInsertId { respond_to } => {
                let _ = respond_to.send(Ok(last_insert_id(conn)));
            }
            Command::Begin { respond_to } => {
                let _ = respond_to.send(run_tx_statement(conn, "BEGIN"));
            }
            Command::Commit { respond_to } => {
                let _ = respond_to.send(run_tx_statement(conn, "COMMIT"));
            }
            Command::Rollback { respond_to } => {
                let _ = respond_to.send(run_tx_statement(conn, "ROLLBACK"));
            }
            other => return Some(other),
        }
    }
}

/// Loop held while a row cursor is open. Returns on exhaustion or error
/// (cursor released, back to the prepared statement) or bubbles any
/// non-cursor command after dropping the cursor.
fn cursor_loop(
    mut rows: rusqlite::Rows<'_>,
    columns: &Arc<Vec<String>>,
    sql: &str,
    receiver: &Receiver<Command>,
) -> Option<Command> {
    loop {
        let command = match receiver.recv() {
            Ok(command) => command,
            Err(_) => return None,
        };
        match command {
            Command::NextRow { respond_to } => match rows.next() {
                Ok(Some(row)) => {
                    let result = materialize_row(row, columns)
                        .map(Some)
                        .map_err(|source| execution_error(sql, source));
                    let _ = respond_to.send(result);
                }
                Ok(None) => {
                    let _ = respond_to.send(Ok(None));
                    return None;
                }
                Err(source) => {
                    let _ = respond_to.send(Err(execution_error(sql, source)));
                    return None;
                }
            },
            Command::FirstColumn { respond_to } => match rows.next() {
                Ok(Some(row)) => {
                    let result = extract_value(row, 0)
                        .map(Some)
                        .map_err(|source| execution_error(sql, source));
                    let _ = respond_to.send(result);
                }
                Ok(None) => {
                    let _ = respond_to.send(Ok(None));
                    return None;
                }
                Err(source) => {
                    let _ = respond_to.send(Err(execution_error(sql, source)));
                    return None;
                }
            },
            other => return Some(other),
        }
    }
}

fn materialize_row(
    row: &rusqlite::Row<'_>,
    columns: &Arc<Vec<String>>,
) -> Result<Row, rusqlite::Error> {
    let mut values = Vec::with_capacity(columns.len());
    for idx in 0..columns.len() {
        values.push(extract_value(row, idx)?);
    }
    Ok(Row::new(Arc::clone(columns), values))
}

fn last_insert_id(conn: &rusqlite::Connection) -> Option<i64> {
    match conn.last_insert_rowid() {
        0 => None,
        id => Some(id),
    }
}

fn run_tx_statement(conn: &rusqlite::Connection, sql: &'static str) -> Result<(), DbError> {
    conn.execute_batch(sql).map_err(DbError::Sqlite)
}

fn execution_error(sql: &str, source: rusqlite::Error) -> DbError {
    DbError::Execution {
        query: sql.to_string(),
        source,
    }
}

/// Runs before the connection re-enters the pool; a pooled connection must
/// never carry an open transaction.
fn finalize(conn: &rusqlite::Connection) {
    if !conn.is_autocommit() {
        tracing::error!("statement worker stopping with an open transaction, rolling back");
        if let Err(err) = conn.execute_batch("ROLLBACK") {
            tracing::error!("rollback during worker teardown failed: {err}");
        }
    }
}
