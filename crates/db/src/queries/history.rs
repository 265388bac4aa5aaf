//! Decay history operations.
//!
//! History is append-only: entries are inserted once and never updated, so
//! reads can rely on strictly ascending, unique timestamps per URL.

use crate::models::DecayHistoryRow;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Append a new history entry for a URL.
pub async fn append(pool: &PgPool, row: &DecayHistoryRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO decay_history (id, user_id, url, score, level, no_activity, delta, computed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&row.id)
    .bind(&row.user_id)
    .bind(&row.url)
    .bind(row.score)
    .bind(row.level)
    .bind(row.no_activity)
    .bind(row.delta)
    .bind(row.computed_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// History entries for a URL within the window, ascending by `computed_at`.
pub async fn list_window(
    pool: &PgPool,
    user_id: &str,
    url: &str,
    since: DateTime<Utc>,
) -> Result<Vec<DecayHistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, DecayHistoryRow>(
        r#"
        SELECT id, user_id, url, score, level, no_activity, delta, computed_at
        FROM decay_history
        WHERE user_id = $1 AND url = $2 AND computed_at >= $3
        ORDER BY computed_at ASC
        "#,
    )
    .bind(user_id)
    .bind(url)
    .bind(since)
    .fetch_all(pool)
    .await
}

/// Most recent entry for a URL, if any. Used to compute the delta for the
/// next entry.
pub async fn latest(
    pool: &PgPool,
    user_id: &str,
    url: &str,
) -> Result<Option<DecayHistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, DecayHistoryRow>(
        r#"
        SELECT id, user_id, url, score, level, no_activity, delta, computed_at
        FROM decay_history
        WHERE user_id = $1 AND url = $2
        ORDER BY computed_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(url)
    .fetch_optional(pool)
    .await
}
