use shutter_payment_engine::{db, SqliteDatabase};
use tempfile::TempDir;

/// Creates a fresh file-backed SQLite database with the schema applied. The `TempDir` must be kept alive for the
/// duration of the test; dropping it deletes the database file.
pub async fn new_test_db() -> (SqliteDatabase, TempDir) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().expect("Error creating temp dir for test database");
    let path = dir.path().join("test.db");
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let db = SqliteDatabase::new_with_url(&url, 25).await.expect("Error creating connection to database");
    db::run_migrations(db.pool()).await.expect("Error running DB migrations");
    (db, dir)
}
