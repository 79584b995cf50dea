use db_conduit::prelude::*;

async fn open_test_db(dir: &tempfile::TempDir) -> Result<Database, DbError> {
    let path = dir.path().join("dispatch.sqlite3");
    let db = DatabaseOptions::builder(path.to_string_lossy().to_string())
        .pool_name("dispatch-test")
        .display_connect_info(false)
        .open()
        .await?;
    db.execute_update(
        "CREATE TABLE words (id INTEGER PRIMARY KEY AUTOINCREMENT, w TEXT)",
        &[],
    )
    .await?;
    Ok(db)
}

#[tokio::test]
async fn async_variants_complete_with_results() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_test_db(&dir).await?;

    let id = db
        .execute_insert_async(
            "INSERT INTO words (w) VALUES (?)",
            &[RowValue::Text("hello".into())],
        )
        .await?;
    assert_eq!(id, Some(1));

    let affected = db
        .execute_update_async(
            "UPDATE words SET w = ? WHERE id = ?",
            &[RowValue::Text("goodbye".into()), RowValue::Int(1)],
        )
        .await?;
    assert_eq!(affected, 1);

    let row = db
        .get_first_row_async("SELECT w FROM words WHERE id = ?", &[RowValue::Int(1)])
        .await?
        .expect("row exists");
    assert_eq!(row.get_string("w")?, Some("goodbye"));

    let rows = db.get_results_async("SELECT id, w FROM words", &[]).await?;
    assert_eq!(rows.len(), 1);

    let values = db
        .get_first_column_results_async("SELECT id FROM words", &[])
        .await?;
    assert_eq!(values, vec![RowValue::Int(1)]);

    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn async_errors_complete_the_future_exceptionally() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_test_db(&dir).await?;

    let err = db
        .get_results_async("SELECT nothing FROM nowhere", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Prepare { .. }));

    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn wait_resolves_from_a_plain_thread() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_test_db(&dir).await?;
    db.execute_update("INSERT INTO words (w) VALUES ('threaded')", &[])
        .await?;

    let worker_db = db.clone();
    let from_thread = tokio::task::spawn_blocking(move || {
        // A synchronous caller blocks on the future instead of awaiting.
        worker_db
            .get_first_column_async("SELECT w FROM words WHERE id = 1", &[])
            .wait()
    })
    .await
    .expect("blocking task panicked")?;
    assert_eq!(from_thread, Some(RowValue::Text("threaded".into())));

    db.close_default().await;
    Ok(())
}

#[tokio::test]
async fn query_async_hands_over_an_open_statement() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_test_db(&dir).await?;
    db.execute_update("INSERT INTO words (w) VALUES ('kept')", &[])
        .await?;

    let mut statement = db.query_async("SELECT w FROM words").await?;
    statement.execute(&[]).await?;
    assert_eq!(
        statement.first_column().await?,
        Some(RowValue::Text("kept".into()))
    );
    statement.close().await;

    db.close_default().await;
    Ok(())
}
