//! Tracked URL reads for the analysis worker.

use crate::models::TrackedUrlRow;
use sqlx::PgPool;

/// Active tracked URLs, optionally narrowed to one user and/or one URL.
pub async fn list_active(
    pool: &PgPool,
    user_id: Option<&str>,
    url: Option<&str>,
) -> Result<Vec<TrackedUrlRow>, sqlx::Error> {
    sqlx::query_as::<_, TrackedUrlRow>(
        r#"
        SELECT id, user_id, url, status, published_at, content_updated_at,
               word_count, created_at
        FROM tracked_urls
        WHERE status = 'active'
          AND ($1::text IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR url = $2)
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(url)
    .fetch_all(pool)
    .await
}
