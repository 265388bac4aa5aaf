use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Severity bucket derived from a decay score.
///
/// Variants are ordered from healthiest to most decayed so that
/// `level >= threshold` comparisons read naturally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DecayLevel {
    Healthy,
    Low,
    Medium,
    High,
    Critical,
}

impl DecayLevel {
    /// Alert priority implied by a decay level.
    pub fn priority(&self) -> AlertPriority {
        match self {
            DecayLevel::Critical => AlertPriority::Critical,
            DecayLevel::High => AlertPriority::High,
            DecayLevel::Medium => AlertPriority::Normal,
            DecayLevel::Low | DecayLevel::Healthy => AlertPriority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Clicks,
    Impressions,
    Position,
    Ctr,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
    Volatile,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Decay,
    Ranking,
    Traffic,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Sent,
    Failed,
    Dismissed,
    Acknowledged,
    Snoozed,
}

/// User-initiated transition on a dispatched alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertAction {
    Dismiss,
    Acknowledge,
    Snooze,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Slack,
    Webhook,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelKind::Email => "email",
            ChannelKind::Slack => "slack",
            ChannelKind::Webhook => "webhook",
        };
        f.write_str(name)
    }
}

/// Normalized classification of a per-channel delivery failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    Auth,
    RateLimited,
    InvalidConfig,
    Unreachable,
    Unknown,
}

/// One day of normalized search performance for a URL, as written by the
/// GSC/GA4 connectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub clicks: u64,
    pub impressions: u64,
    pub position: f64,
    pub ctr: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentMeta {
    pub published_at: Option<NaiveDate>,
    pub updated_at: Option<NaiveDate>,
    pub word_count: Option<u32>,
}

/// Immutable snapshot of a URL's metric window, input to the calculator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecayAnalysisInput {
    pub url: String,
    pub user_id: String,
    pub points: Vec<MetricPoint>,
    pub meta: ContentMeta,
}

/// Contribution of a single metric to the final decay score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContributingFactor {
    pub metric: MetricKind,
    /// Percentage decline between baseline and recent period, clamped to [0, 100].
    pub delta_pct: f64,
    pub weight: f64,
    /// `weight * delta_pct`; factors are ranked by this value.
    pub contribution: f64,
}

/// Decay severity for one URL at one point in time.
///
/// Polarity convention: higher score means more decay. Presentation layers
/// that want "higher is better" invert at display time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecayScore {
    pub url: String,
    pub user_id: String,
    pub score: f64,
    pub level: DecayLevel,
    pub computed_at: DateTime<Utc>,
    /// Set when the page shows no traffic in either period, so callers do
    /// not alert on silence.
    pub no_activity: bool,
    pub factors: Vec<ContributingFactor>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    RefreshContent,
    RebuildBacklinks,
    ReviewKeywords,
    CheckTechnical,
    Monitor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecayRecommendation {
    pub action: RecommendedAction,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecayAnalysisResult {
    pub score: DecayScore,
    pub recommendations: Vec<DecayRecommendation>,
}

/// Calculator outcome. Not having enough history is an expected result,
/// not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecayOutcome {
    Scored(DecayAnalysisResult),
    InsufficientData {
        points_recent: usize,
        points_baseline: usize,
        required: usize,
    },
}

/// Persisted decay score plus the delta versus the previous entry.
///
/// Entries for a URL are append-only, strictly ascending in `computed_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecayHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub score: f64,
    pub level: DecayLevel,
    pub no_activity: bool,
    pub computed_at: DateTime<Utc>,
    /// Score change versus the prior entry; `None` for the first entry.
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendProjection {
    pub horizon_days: u32,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnomaly {
    pub computed_at: DateTime<Utc>,
    pub score: f64,
    /// Score the fitted line expected at this timestamp.
    pub expected: f64,
    pub deviation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecayTrendAnalysis {
    pub trend: TrendDirection,
    /// Fitted score change per day. Positive slope means worsening decay.
    pub slope_per_day: f64,
    pub projections: Vec<TrendProjection>,
    /// Bounded (0, 1); grows with point count, shrinks with residual noise.
    pub confidence: f64,
    pub anomalies: Vec<TrendAnomaly>,
    pub points_used: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendOutcome {
    Analyzed(DecayTrendAnalysis),
    InsufficientData { points: usize, required: usize },
}

impl TrendOutcome {
    pub fn as_analysis(&self) -> Option<&DecayTrendAnalysis> {
        match self {
            TrendOutcome::Analyzed(analysis) => Some(analysis),
            TrendOutcome::InsufficientData { .. } => None,
        }
    }
}

/// Ephemeral trigger payload consumed by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub category: AlertCategory,
    pub priority: AlertPriority,
    pub user_id: String,
    pub subject_url: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Outcome of one channel send attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub channel: ChannelKind,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub error_kind: Option<DeliveryErrorKind>,
    pub latency_ms: Option<i64>,
}

impl ChannelResult {
    pub fn success(channel: ChannelKind, status_code: Option<u16>, latency_ms: i64) -> Self {
        Self {
            channel,
            success: true,
            status_code,
            error: None,
            error_kind: None,
            latency_ms: Some(latency_ms),
        }
    }

    pub fn failure(
        channel: ChannelKind,
        kind: DeliveryErrorKind,
        error: impl Into<String>,
        status_code: Option<u16>,
        latency_ms: Option<i64>,
    ) -> Self {
        Self {
            channel,
            success: false,
            status_code,
            error: Some(error.into()),
            error_kind: Some(kind),
            latency_ms,
        }
    }
}

/// Persisted record of a dispatched (or attempted) notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub user_id: String,
    pub category: AlertCategory,
    pub priority: AlertPriority,
    pub subject_url: String,
    pub title: String,
    pub body: String,
    pub status: AlertStatus,
    pub channel_results: Vec<ChannelResult>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailChannelConfig {
    pub enabled: bool,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlackChannelConfig {
    pub enabled: bool,
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookChannelConfig {
    pub enabled: bool,
    pub url: String,
    /// Optional HMAC secret; when set, deliveries carry a signature header.
    pub secret: Option<String>,
}

/// UTC hour-of-day window during which non-critical alerts are suppressed.
///
/// Wrap-around windows (e.g. 22-6) are supported. `start_hour == end_hour`
/// is an empty window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl QuietHours {
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour == self.end_hour {
            return false;
        }
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Per-user alert configuration, read before every dispatch and never
/// mutated by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserAlertPreferences {
    pub user_id: String,
    pub email: Option<EmailChannelConfig>,
    pub slack: Option<SlackChannelConfig>,
    pub webhook: Option<WebhookChannelConfig>,
    pub muted_categories: Vec<AlertCategory>,
    /// Minimum decay level that triggers a decay alert.
    pub min_decay_level: DecayLevel,
    pub quiet_hours: Option<QuietHours>,
    /// Minimum interval between repeat alerts for the same URL and category,
    /// enforced by the trigger, not the dispatcher.
    pub cooldown_hours: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering_healthy_to_critical() {
        assert!(DecayLevel::Healthy < DecayLevel::Low);
        assert!(DecayLevel::Low < DecayLevel::Medium);
        assert!(DecayLevel::Medium < DecayLevel::High);
        assert!(DecayLevel::High < DecayLevel::Critical);
    }

    #[test]
    fn test_level_priority_mapping() {
        assert_eq!(DecayLevel::Critical.priority(), AlertPriority::Critical);
        assert_eq!(DecayLevel::High.priority(), AlertPriority::High);
        assert_eq!(DecayLevel::Medium.priority(), AlertPriority::Normal);
        assert_eq!(DecayLevel::Low.priority(), AlertPriority::Low);
        assert_eq!(DecayLevel::Healthy.priority(), AlertPriority::Low);
    }

    #[test]
    fn test_quiet_hours_simple_window() {
        let quiet = QuietHours { start_hour: 9, end_hour: 17 };
        assert!(!quiet.contains(8));
        assert!(quiet.contains(9));
        assert!(quiet.contains(16));
        assert!(!quiet.contains(17), "end hour is exclusive");
        assert!(!quiet.contains(23));
    }

    #[test]
    fn test_quiet_hours_wrap_around() {
        let quiet = QuietHours { start_hour: 22, end_hour: 6 };
        assert!(quiet.contains(22));
        assert!(quiet.contains(23));
        assert!(quiet.contains(0));
        assert!(quiet.contains(5));
        assert!(!quiet.contains(6));
        assert!(!quiet.contains(12));
    }

    #[test]
    fn test_quiet_hours_equal_bounds_is_empty() {
        let quiet = QuietHours { start_hour: 3, end_hour: 3 };
        for hour in 0..24 {
            assert!(!quiet.contains(hour), "hour {} should not be quiet", hour);
        }
    }

    #[test]
    fn test_decay_outcome_serializes_with_status_tag() {
        let outcome = DecayOutcome::InsufficientData {
            points_recent: 2,
            points_baseline: 0,
            required: 7,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert_eq!(json["points_recent"], 2);
    }

    #[test]
    fn test_channel_kind_display() {
        assert_eq!(ChannelKind::Email.to_string(), "email");
        assert_eq!(ChannelKind::Slack.to_string(), "slack");
        assert_eq!(ChannelKind::Webhook.to_string(), "webhook");
    }
}
