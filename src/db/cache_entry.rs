// Row-level access to the cache_entries table. TTL policy lives in the cache
// managers; this module only reads and writes rows.

use sqlx::{Pool, Row, Sqlite};

pub struct CacheRow {
    pub value: String,
    pub stored_at: i64,
}

pub async fn get(
    pool: &Pool<Sqlite>,
    namespace: &str,
    account: &str,
) -> Result<Option<CacheRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT value, stored_at FROM cache_entries WHERE namespace = ? AND account = ?",
    )
    .bind(namespace)
    .bind(account)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| CacheRow {
        value: row.get("value"),
        stored_at: row.get("stored_at"),
    }))
}

pub async fn put(
    pool: &Pool<Sqlite>,
    namespace: &str,
    account: &str,
    value: &str,
    stored_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO cache_entries (namespace, account, value, stored_at)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(namespace, account)
           DO UPDATE SET value = excluded.value, stored_at = excluded.stored_at"#,
    )
    .bind(namespace)
    .bind(account)
    .bind(value)
    .bind(stored_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn remove(
    pool: &Pool<Sqlite>,
    namespace: &str,
    account: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE namespace = ? AND account = ?")
        .bind(namespace)
        .bind(account)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn clear(pool: &Pool<Sqlite>, namespace: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE namespace = ?")
        .bind(namespace)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Returns (valid, total) for a namespace. An entry is valid while
/// `stored_at + ttl` has not elapsed.
pub async fn stats(
    pool: &Pool<Sqlite>,
    namespace: &str,
    ttl_secs: i64,
    now: i64,
) -> Result<(i64, i64), sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT COUNT(*) AS total,
                  COALESCE(SUM(CASE WHEN stored_at + ? > ? THEN 1 ELSE 0 END), 0) AS valid
           FROM cache_entries WHERE namespace = ?"#,
    )
    .bind(ttl_secs)
    .bind(now)
    .bind(namespace)
    .fetch_one(pool)
    .await?;

    Ok((row.get::<i64, _>("valid"), row.get::<i64, _>("total")))
}
