//! Alert preference reads. Preferences are written by the settings UI
//! (outside this subsystem) and only read here.

use crate::models::AlertPreferencesRow;
use sqlx::PgPool;

pub async fn get_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<AlertPreferencesRow>, sqlx::Error> {
    sqlx::query_as::<_, AlertPreferencesRow>(
        r#"
        SELECT user_id, email_enabled, email_address,
               slack_enabled, slack_webhook_url,
               webhook_enabled, webhook_url, webhook_secret,
               muted_categories, min_decay_level,
               quiet_start_hour, quiet_end_hour, cooldown_hours
        FROM alert_preferences
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
