use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "decay_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DecayLevel {
    Healthy,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "alert_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Decay,
    Ranking,
    Traffic,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "alert_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "alert_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Sent,
    Failed,
    Dismissed,
    Acknowledged,
    Snoozed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "tracked_url_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TrackedUrlStatus {
    Active,
    Paused,
    Deleted,
}

/// One day of normalized metrics for a URL, written by the GSC/GA4
/// connectors.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UrlMetricRow {
    pub user_id: String,
    pub url: String,
    pub date: NaiveDate,
    pub clicks: i64,
    pub impressions: i64,
    pub position: f64,
    pub ctr: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DecayHistoryRow {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub score: f64,
    pub level: DecayLevel,
    pub no_activity: bool,
    pub delta: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRow {
    pub id: String,
    pub user_id: String,
    pub category: AlertCategory,
    pub priority: AlertPriority,
    pub subject_url: String,
    pub title: String,
    pub body: String,
    pub status: AlertStatus,
    pub channel_results: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertPreferencesRow {
    pub user_id: String,
    pub email_enabled: bool,
    pub email_address: Option<String>,
    pub slack_enabled: bool,
    pub slack_webhook_url: Option<String>,
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub muted_categories: Vec<String>,
    pub min_decay_level: DecayLevel,
    pub quiet_start_hour: Option<i16>,
    pub quiet_end_hour: Option<i16>,
    pub cooldown_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackedUrlRow {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub status: TrackedUrlStatus,
    pub published_at: Option<NaiveDate>,
    pub content_updated_at: Option<NaiveDate>,
    pub word_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}
