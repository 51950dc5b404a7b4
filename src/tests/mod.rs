pub mod queue_tests;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Fresh in-memory database with the schema applied. A single connection
/// keeps every statement on the same in-memory instance.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::raw_sql(crate::db::INIT_SCHEMA)
        .execute(&pool)
        .await
        .expect("schema init");
    pool
}
