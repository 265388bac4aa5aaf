//! Collaborator contracts consumed by the core components.
//!
//! Implementations are injected; nothing in this crate touches a database or
//! the network directly.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::types::{
    Alert, AlertAction, AlertCategory, DecayHistoryEntry, MetricPoint, UserAlertPreferences,
};

/// Read/write contract over durable storage for scores, alerts, and
/// preferences. The gateway is the sole owner of durable state.
pub trait PersistenceGateway: Send + Sync {
    /// History entries for a URL within the window, ascending by
    /// `computed_at`, no duplicate timestamps.
    fn get_history(
        &self,
        user_id: &str,
        url: &str,
        window_days: u32,
    ) -> impl Future<Output = Result<Vec<DecayHistoryEntry>, GatewayError>> + Send;

    /// Append-only; implementations must never rewrite existing entries.
    fn append_history_entry(
        &self,
        entry: &DecayHistoryEntry,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// `NotFound` when the user has never configured alerting.
    fn get_preferences(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<UserAlertPreferences, GatewayError>> + Send;

    fn save_alert(&self, alert: &Alert) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Timestamp of the most recent alert for (user, URL, category), `None`
    /// when none was ever raised. Feeds the trigger's cool-down rule.
    fn last_alert_at(
        &self,
        user_id: &str,
        subject_url: &str,
        category: AlertCategory,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, GatewayError>> + Send;

    /// Apply a user action (dismiss/acknowledge/snooze) to a dispatched alert.
    fn update_alert_status(
        &self,
        alert_id: &str,
        action: AlertAction,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Source of normalized per-day metrics for a tracked URL, fed by the
/// GSC/GA4 connectors.
pub trait MetricsProvider: Send + Sync {
    /// Points for the last `lookback_days`, ascending by date.
    fn fetch_metrics(
        &self,
        user_id: &str,
        url: &str,
        lookback_days: u32,
    ) -> impl Future<Output = Result<Vec<MetricPoint>, GatewayError>> + Send;
}
