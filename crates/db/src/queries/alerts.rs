//! Alert log operations.
//!
//! Alerts are written once by the dispatcher with their final delivery
//! status; afterwards only user actions (dismiss/acknowledge/snooze) touch
//! them.

use crate::models::{AlertCategory, AlertRow, AlertStatus};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct CreatedAtRow {
    created_at: DateTime<Utc>,
}

/// Persist a dispatched (or attempted) alert with its per-channel results.
pub async fn create(pool: &PgPool, row: &AlertRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO alerts (id, user_id, category, priority, subject_url, title, body,
                            status, channel_results, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&row.id)
    .bind(&row.user_id)
    .bind(row.category)
    .bind(row.priority)
    .bind(&row.subject_url)
    .bind(&row.title)
    .bind(&row.body)
    .bind(row.status)
    .bind(&row.channel_results)
    .bind(row.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Apply a user action to an alert. Only delivery-final alerts can be acted
/// on; returns the number of rows changed so callers can detect a miss.
pub async fn update_status(
    pool: &PgPool,
    id: &str,
    status: AlertStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE alerts
        SET status = $1
        WHERE id = $2 AND status IN ('pending', 'sent', 'failed', 'snoozed')
        "#,
    )
    .bind(status)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Timestamp of the most recent alert for a (user, URL, category) triple.
/// The trigger uses this to enforce the cool-down window.
pub async fn last_alert_at(
    pool: &PgPool,
    user_id: &str,
    subject_url: &str,
    category: AlertCategory,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let row = sqlx::query_as::<_, CreatedAtRow>(
        r#"
        SELECT created_at
        FROM alerts
        WHERE user_id = $1 AND subject_url = $2 AND category = $3
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(subject_url)
    .bind(category)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.created_at))
}
