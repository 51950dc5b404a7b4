// Manually trusted accounts. Unlike cached lookup results these never
// expire; the list only changes through explicit add/remove/clear.

use sqlx::{Pool, Row, Sqlite};
use std::time::{SystemTime, UNIX_EPOCH};

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub async fn add(pool: &Pool<Sqlite>, account: &str) -> Result<(), sqlx::Error> {
    let now = unix_now();

    sqlx::query(
        "INSERT INTO trust_list (account, added_at) VALUES (?, ?)
         ON CONFLICT(account) DO NOTHING",
    )
    .bind(account)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn remove(pool: &Pool<Sqlite>, account: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM trust_list WHERE account = ?")
        .bind(account)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn all(pool: &Pool<Sqlite>) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT account FROM trust_list ORDER BY added_at, account")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|row| row.get("account")).collect())
}

pub async fn count(pool: &Pool<Sqlite>) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM trust_list")
        .fetch_one(pool)
        .await?;

    Ok(row.get("count"))
}

pub async fn clear(pool: &Pool<Sqlite>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM trust_list").execute(pool).await?;

    Ok(result.rows_affected())
}
