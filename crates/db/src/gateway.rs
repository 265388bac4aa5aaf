//! Postgres-backed implementation of the core persistence contracts.

use chrono::{DateTime, Duration, Utc};
use decaywatch_core::error::GatewayError;
use decaywatch_core::gateway::{MetricsProvider, PersistenceGateway};
use decaywatch_core::types as domain;
use sqlx::PgPool;

use crate::models;
use crate::queries;

#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_err(err: sqlx::Error) -> GatewayError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            GatewayError::Unavailable(err.to_string())
        }
        _ => GatewayError::Backend(err.to_string()),
    }
}

impl PersistenceGateway for PgGateway {
    async fn get_history(
        &self,
        user_id: &str,
        url: &str,
        window_days: u32,
    ) -> Result<Vec<domain::DecayHistoryEntry>, GatewayError> {
        let since = Utc::now() - Duration::days(window_days as i64);
        let rows = queries::history::list_window(&self.pool, user_id, url, since)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(history_from_row).collect())
    }

    async fn append_history_entry(
        &self,
        entry: &domain::DecayHistoryEntry,
    ) -> Result<(), GatewayError> {
        let row = models::DecayHistoryRow {
            id: entry.id.clone(),
            user_id: entry.user_id.clone(),
            url: entry.url.clone(),
            score: entry.score,
            level: level_to_db(entry.level),
            no_activity: entry.no_activity,
            delta: entry.delta,
            computed_at: entry.computed_at,
        };
        queries::history::append(&self.pool, &row)
            .await
            .map_err(store_err)
    }

    async fn get_preferences(
        &self,
        user_id: &str,
    ) -> Result<domain::UserAlertPreferences, GatewayError> {
        let row = queries::preferences::get_by_user(&self.pool, user_id)
            .await
            .map_err(store_err)?;
        match row {
            Some(row) => Ok(prefs_from_row(row)),
            None => Err(GatewayError::NotFound(format!(
                "alert preferences for user {}",
                user_id
            ))),
        }
    }

    async fn save_alert(&self, alert: &domain::Alert) -> Result<(), GatewayError> {
        let channel_results = serde_json::to_value(&alert.channel_results)
            .map_err(|err| GatewayError::Backend(err.to_string()))?;
        let row = models::AlertRow {
            id: alert.id.clone(),
            user_id: alert.user_id.clone(),
            category: category_to_db(alert.category),
            priority: priority_to_db(alert.priority),
            subject_url: alert.subject_url.clone(),
            title: alert.title.clone(),
            body: alert.body.clone(),
            status: status_to_db(alert.status),
            channel_results,
            created_at: alert.created_at,
        };
        queries::alerts::create(&self.pool, &row)
            .await
            .map_err(store_err)
    }

    async fn last_alert_at(
        &self,
        user_id: &str,
        subject_url: &str,
        category: domain::AlertCategory,
    ) -> Result<Option<DateTime<Utc>>, GatewayError> {
        queries::alerts::last_alert_at(&self.pool, user_id, subject_url, category_to_db(category))
            .await
            .map_err(store_err)
    }

    async fn update_alert_status(
        &self,
        alert_id: &str,
        action: domain::AlertAction,
    ) -> Result<(), GatewayError> {
        let changed =
            queries::alerts::update_status(&self.pool, alert_id, action_status(action))
                .await
                .map_err(store_err)?;
        if changed == 0 {
            return Err(GatewayError::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }
}

impl MetricsProvider for PgGateway {
    async fn fetch_metrics(
        &self,
        user_id: &str,
        url: &str,
        lookback_days: u32,
    ) -> Result<Vec<domain::MetricPoint>, GatewayError> {
        let rows = queries::metrics::window_for_url(&self.pool, user_id, url, lookback_days as i32)
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|row| domain::MetricPoint {
                date: row.date,
                clicks: row.clicks.max(0) as u64,
                impressions: row.impressions.max(0) as u64,
                position: row.position,
                ctr: row.ctr,
            })
            .collect())
    }
}

fn history_from_row(row: models::DecayHistoryRow) -> domain::DecayHistoryEntry {
    domain::DecayHistoryEntry {
        id: row.id,
        user_id: row.user_id,
        url: row.url,
        score: row.score,
        level: level_from_db(row.level),
        no_activity: row.no_activity,
        computed_at: row.computed_at,
        delta: row.delta,
    }
}

fn prefs_from_row(row: models::AlertPreferencesRow) -> domain::UserAlertPreferences {
    let quiet_hours = match (row.quiet_start_hour, row.quiet_end_hour) {
        (Some(start), Some(end)) => Some(domain::QuietHours {
            start_hour: start.clamp(0, 23) as u8,
            end_hour: end.clamp(0, 23) as u8,
        }),
        _ => None,
    };
    domain::UserAlertPreferences {
        user_id: row.user_id,
        email: row.email_address.map(|address| domain::EmailChannelConfig {
            enabled: row.email_enabled,
            address,
        }),
        slack: row
            .slack_webhook_url
            .map(|webhook_url| domain::SlackChannelConfig {
                enabled: row.slack_enabled,
                webhook_url,
            }),
        webhook: row.webhook_url.map(|url| domain::WebhookChannelConfig {
            enabled: row.webhook_enabled,
            url,
            secret: row.webhook_secret,
        }),
        muted_categories: row
            .muted_categories
            .iter()
            .filter_map(|name| category_from_str(name))
            .collect(),
        min_decay_level: level_from_db(row.min_decay_level),
        quiet_hours,
        cooldown_hours: row.cooldown_hours.max(0) as u32,
    }
}

fn level_to_db(level: domain::DecayLevel) -> models::DecayLevel {
    match level {
        domain::DecayLevel::Healthy => models::DecayLevel::Healthy,
        domain::DecayLevel::Low => models::DecayLevel::Low,
        domain::DecayLevel::Medium => models::DecayLevel::Medium,
        domain::DecayLevel::High => models::DecayLevel::High,
        domain::DecayLevel::Critical => models::DecayLevel::Critical,
    }
}

fn level_from_db(level: models::DecayLevel) -> domain::DecayLevel {
    match level {
        models::DecayLevel::Healthy => domain::DecayLevel::Healthy,
        models::DecayLevel::Low => domain::DecayLevel::Low,
        models::DecayLevel::Medium => domain::DecayLevel::Medium,
        models::DecayLevel::High => domain::DecayLevel::High,
        models::DecayLevel::Critical => domain::DecayLevel::Critical,
    }
}

pub(crate) fn category_to_db(category: domain::AlertCategory) -> models::AlertCategory {
    match category {
        domain::AlertCategory::Decay => models::AlertCategory::Decay,
        domain::AlertCategory::Ranking => models::AlertCategory::Ranking,
        domain::AlertCategory::Traffic => models::AlertCategory::Traffic,
        domain::AlertCategory::Error => models::AlertCategory::Error,
    }
}

fn category_from_str(name: &str) -> Option<domain::AlertCategory> {
    match name {
        "decay" => Some(domain::AlertCategory::Decay),
        "ranking" => Some(domain::AlertCategory::Ranking),
        "traffic" => Some(domain::AlertCategory::Traffic),
        "error" => Some(domain::AlertCategory::Error),
        _ => None,
    }
}

fn priority_to_db(priority: domain::AlertPriority) -> models::AlertPriority {
    match priority {
        domain::AlertPriority::Low => models::AlertPriority::Low,
        domain::AlertPriority::Normal => models::AlertPriority::Normal,
        domain::AlertPriority::High => models::AlertPriority::High,
        domain::AlertPriority::Critical => models::AlertPriority::Critical,
    }
}

fn status_to_db(status: domain::AlertStatus) -> models::AlertStatus {
    match status {
        domain::AlertStatus::Pending => models::AlertStatus::Pending,
        domain::AlertStatus::Sent => models::AlertStatus::Sent,
        domain::AlertStatus::Failed => models::AlertStatus::Failed,
        domain::AlertStatus::Dismissed => models::AlertStatus::Dismissed,
        domain::AlertStatus::Acknowledged => models::AlertStatus::Acknowledged,
        domain::AlertStatus::Snoozed => models::AlertStatus::Snoozed,
    }
}

/// User actions map onto terminal-ish statuses; only snooze can be acted on
/// again later.
fn action_status(action: domain::AlertAction) -> models::AlertStatus {
    match action {
        domain::AlertAction::Dismiss => models::AlertStatus::Dismissed,
        domain::AlertAction::Acknowledge => models::AlertStatus::Acknowledged,
        domain::AlertAction::Snooze => models::AlertStatus::Snoozed,
    }
}
