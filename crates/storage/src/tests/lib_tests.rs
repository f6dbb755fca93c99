use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn token_slot_round_trips_and_clears() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.session_token().await.expect("read"), None);

    storage.set_session_token("tok-1").await.expect("set");
    assert_eq!(
        storage.session_token().await.expect("read"),
        Some("tok-1".to_string())
    );

    storage.set_session_token("tok-2").await.expect("overwrite");
    assert_eq!(
        storage.session_token().await.expect("read"),
        Some("tok-2".to_string())
    );

    storage.clear_session_token().await.expect("clear");
    assert_eq!(storage.session_token().await.expect("read"), None);

    // Clearing an already-empty slot is a no-op.
    storage.clear_session_token().await.expect("clear again");
}

#[tokio::test]
async fn token_survives_pool_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = Storage::sqlite_url_for_data_dir(dir.path());

    {
        let storage = Storage::new(&database_url).await.expect("db");
        storage.set_session_token("persisted").await.expect("set");
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.session_token().await.expect("read"),
        Some("persisted".to_string())
    );
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("client_state.sqlite3");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}
