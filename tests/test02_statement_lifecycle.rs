use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use db_conduit::prelude::*;

async fn open_single_connection_db(
    dir: &tempfile::TempDir,
) -> Result<Database, DbError> {
    let path = dir.path().join("lifecycle.sqlite3");
    DatabaseOptions::builder(path.to_string_lossy().to_string())
        .pool_name("lifecycle-test")
        .max_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .display_connect_info(false)
        .open()
        .await
}

#[tokio::test]
async fn row_count_matches_result_set() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_single_connection_db(&dir).await?;
    db.execute_update("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
        .await?;
    for i in 1..=5_i64 {
        db.execute_update(
            "INSERT INTO t (id, v) VALUES (?, ?)",
            &[RowValue::Int(i), RowValue::Text(format!("v{i}"))],
        )
        .await?;
    }

    let mut statement = db.query("SELECT id, v FROM t ORDER BY id").await?;
    statement.execute(&[]).await?;
    assert_eq!(
        statement.column_names().map(|cols| (**cols).clone()),
        Some(vec!["id".to_string(), "v".to_string()])
    );

    let mut fetched = 0;
    while let Some(row) = statement.next_row().await? {
        fetched += 1;
        assert_eq!(row.get_long("id")?, Some(fetched));
        assert_eq!(*row.column_names, vec!["id".to_string(), "v".to_string()]);
    }
    assert_eq!(fetched, 5);

    // Cursor exhausted and released: further fetches and drains see nothing.
    assert!(statement.next_row().await?.is_none());
    assert!(statement.results().await?.is_none());

    statement.close().await;
    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn results_distinguishes_unexecuted_from_empty() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_single_connection_db(&dir).await?;
    db.execute_update("CREATE TABLE empty_t (id INTEGER)", &[])
        .await?;

    let mut statement = db.query("SELECT id FROM empty_t").await?;
    // No execute yet: no cursor was ever opened.
    assert!(statement.results().await?.is_none());

    statement.execute(&[]).await?;
    let rows = statement.results().await?;
    assert_eq!(rows.map(|r| r.len()), Some(0));

    statement.close().await;
    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn execute_before_query_is_a_programmer_error() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_single_connection_db(&dir).await?;

    let mut statement = db.create_statement().await?;
    let err = statement.execute(&[]).await.unwrap_err();
    assert!(matches!(err, DbError::NoActiveStatement));
    let err = statement.execute_update(&[]).await.unwrap_err();
    assert!(matches!(err, DbError::NoActiveStatement));

    // The statement is still usable afterwards.
    statement.query("SELECT 1").await?;
    statement.execute(&[]).await?;
    assert!(statement.first_column().await?.is_some());

    statement.close().await;
    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn prepare_failure_closes_and_releases() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_single_connection_db(&dir).await?;

    let err = db.query("SELECT definitely not sql").await.unwrap_err();
    assert!(matches!(err, DbError::Prepare { .. }));

    // With a single-connection pool, a leaked connection would hang here.
    let mut statement = db.query("SELECT 1").await?;
    statement.execute(&[]).await?;
    assert_eq!(
        statement.first_column().await?,
        Some(RowValue::Int(1))
    );
    statement.close().await;

    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn close_is_idempotent() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_single_connection_db(&dir).await?;

    let mut statement = db.query("SELECT 1").await?;
    assert!(!statement.is_closed());
    statement.close().await;
    assert!(statement.is_closed());
    statement.close().await;
    statement.close().await;
    assert!(statement.is_closed());

    // The connection went back exactly once; the pool still works.
    let mut again = db.query("SELECT 1").await?;
    again.execute(&[]).await?;
    again.close().await;

    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn replacing_a_prepared_statement_closes_the_old_cursor() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_single_connection_db(&dir).await?;
    db.execute_update("CREATE TABLE r (id INTEGER)", &[]).await?;
    db.execute_update("INSERT INTO r (id) VALUES (1), (2), (3)", &[])
        .await?;

    let mut statement = db.query("SELECT id FROM r ORDER BY id").await?;
    statement.execute(&[]).await?;
    assert_eq!(statement.first_column().await?, Some(RowValue::Int(1)));

    // Re-preparing drops the half-consumed cursor and the old statement.
    statement.query("SELECT COUNT(*) FROM r").await?;
    assert!(statement.results().await?.is_none());
    statement.execute(&[]).await?;
    assert_eq!(statement.first_column().await?, Some(RowValue::Int(3)));

    statement.close().await;
    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn dropped_statement_still_releases_its_connection() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_single_connection_db(&dir).await?;
    db.execute_update("CREATE TABLE d (id INTEGER)", &[]).await?;

    {
        let mut statement = db.query("INSERT INTO d (id) VALUES (1)").await?;
        statement.start_transaction().await?;
        statement.execute_update(&[]).await?;
        // Dropped without close: the worker must roll back and release.
        drop(statement);
    }

    // Pool size is 1, so this waits until the worker returned the
    // connection; the dirty insert must be gone and no transaction open.
    let mut statement = db.query("SELECT COUNT(*) FROM d").await?;
    statement.execute(&[]).await?;
    assert_eq!(statement.first_column().await?, Some(RowValue::Int(0)));
    // A fresh BEGIN succeeds only if the teardown rollback ran.
    statement.start_transaction().await?;
    statement.rollback().await?;
    statement.close().await;

    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn pool_exhaustion_reports_fatal_error() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let fatal_count = Arc::new(AtomicUsize::new(0));
    let handler_count = Arc::clone(&fatal_count);
    let path = dir.path().join("fatal.sqlite3");
    let db = DatabaseOptions::builder(path.to_string_lossy().to_string())
        .pool_name("fatal-test")
        .max_connections(1)
        .connect_timeout(Duration::from_millis(100))
        .display_connect_info(false)
        .on_fatal_error(Arc::new(move |_err| {
            handler_count.fetch_add(1, Ordering::SeqCst);
        }))
        .open()
        .await?;

    let mut holder = db.query("SELECT 1").await?;
    let err = db.create_statement().await.unwrap_err();
    assert!(matches!(err, DbError::Pool(_)));
    assert_eq!(fatal_count.load(Ordering::SeqCst), 1);

    holder.close().await;
    db.close_default().await;
    Ok(())
}
