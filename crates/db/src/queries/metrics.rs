//! Reads over the normalized daily metrics written by the GSC/GA4
//! connectors. This subsystem never writes metric rows.

use crate::models::UrlMetricRow;
use sqlx::PgPool;

/// Metric rows for a URL over the trailing lookback window, ascending by
/// date.
pub async fn window_for_url(
    pool: &PgPool,
    user_id: &str,
    url: &str,
    lookback_days: i32,
) -> Result<Vec<UrlMetricRow>, sqlx::Error> {
    sqlx::query_as::<_, UrlMetricRow>(
        r#"
        SELECT user_id, url, date, clicks, impressions, position, ctr
        FROM url_metrics
        WHERE user_id = $1 AND url = $2 AND date >= CURRENT_DATE - $3
        ORDER BY date ASC
        "#,
    )
    .bind(user_id)
    .bind(url)
    .bind(lookback_days)
    .fetch_all(pool)
    .await
}
