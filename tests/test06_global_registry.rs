//! The registry is process-wide state, so the whole flow lives in one test.

use std::time::Duration;

use db_conduit::prelude::*;
use db_conduit::global;

#[tokio::test]
async fn global_registry_round_trip() -> Result<(), DbError> {
    assert!(global::try_global().is_none());

    let err = global::get_first_row("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::Config(_)));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("global.sqlite3");
    let db = DatabaseOptions::builder(path.to_string_lossy().to_string())
        .pool_name("global-test")
        .display_connect_info(false)
        .open()
        .await?;
    global::set_global(db);
    assert!(global::try_global().is_some());

    global::execute_update(
        "CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT)",
        &[],
    )
    .await?;
    global::execute_insert(
        "INSERT INTO settings (key, value) VALUES (?, ?)",
        &[
            RowValue::Text("motd".into()),
            RowValue::Text("welcome".into()),
        ],
    )
    .await?;

    let value = global::get_first_column(
        "SELECT value FROM settings WHERE key = ?",
        &[RowValue::Text("motd".into())],
    )
    .await?;
    assert_eq!(value, Some(RowValue::Text("welcome".into())));

    let rows = global::get_results("SELECT key, value FROM settings", &[]).await?;
    assert_eq!(rows.len(), 1);
    let keys = global::get_first_column_results("SELECT key FROM settings", &[]).await?;
    assert_eq!(keys, vec![RowValue::Text("motd".into())]);
    let row = global::get_first_row("SELECT value FROM settings", &[])
        .await?
        .unwrap();
    assert_eq!(row.get_string("value")?, Some("welcome"));

    global::close_global(Duration::from_secs(10)).await;
    assert!(global::try_global().is_none());

    // Helpers fail cleanly again after teardown.
    let err = global::execute_update("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::Config(_)));

    Ok(())
}
