use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DecayError, TrendError};
use crate::types::{DecayLevel, MetricKind};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Per-metric weights for the decay score. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricWeights {
    pub clicks: f64,
    pub impressions: f64,
    pub position: f64,
    pub ctr: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            clicks: 0.35,
            impressions: 0.15,
            position: 0.30,
            ctr: 0.20,
        }
    }
}

impl MetricWeights {
    pub fn sum(&self) -> f64 {
        self.clicks + self.impressions + self.position + self.ctr
    }

    pub fn for_metric(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::Clicks => self.clicks,
            MetricKind::Impressions => self.impressions,
            MetricKind::Position => self.position,
            MetricKind::Ctr => self.ctr,
        }
    }
}

/// Score cutoffs for the discrete decay levels. Mapping is exhaustive over
/// [0, 100]: anything below `low` is healthy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            critical: 80.0,
            high: 60.0,
            medium: 35.0,
            low: 10.0,
        }
    }
}

impl LevelThresholds {
    pub fn level_for(&self, score: f64) -> DecayLevel {
        if score >= self.critical {
            DecayLevel::Critical
        } else if score >= self.high {
            DecayLevel::High
        } else if score >= self.medium {
            DecayLevel::Medium
        } else if score >= self.low {
            DecayLevel::Low
        } else {
            DecayLevel::Healthy
        }
    }
}

/// Configuration for the decay calculator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecayDetectionConfig {
    /// Length of the recent comparison window, in days.
    pub recent_days: u32,
    /// Length of the baseline window preceding the recent one, in days.
    pub baseline_days: u32,
    /// Minimum data points required in each window.
    pub min_points_per_period: usize,
    pub weights: MetricWeights,
    pub levels: LevelThresholds,
}

impl Default for DecayDetectionConfig {
    fn default() -> Self {
        Self {
            recent_days: 30,
            baseline_days: 60,
            min_points_per_period: 7,
            weights: MetricWeights::default(),
            levels: LevelThresholds::default(),
        }
    }
}

impl DecayDetectionConfig {
    /// Fail-fast validation, run before any computation.
    pub fn validate(&self) -> Result<(), DecayError> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DecayError::InvalidConfig(format!(
                "metric weights must sum to 1.0, got {}",
                sum
            )));
        }
        let levels = &self.levels;
        let ordered = levels.critical > levels.high
            && levels.high > levels.medium
            && levels.medium > levels.low;
        if !ordered {
            return Err(DecayError::InvalidConfig(
                "level thresholds must be strictly decreasing".to_string(),
            ));
        }
        if levels.critical > 100.0 || levels.low < 0.0 {
            return Err(DecayError::InvalidConfig(
                "level thresholds must lie within [0, 100]".to_string(),
            ));
        }
        if self.recent_days == 0 || self.baseline_days == 0 {
            return Err(DecayError::InvalidConfig(
                "comparison windows must be non-empty".to_string(),
            ));
        }
        if self.min_points_per_period == 0 {
            return Err(DecayError::InvalidConfig(
                "min_points_per_period must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the trend analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendConfig {
    /// Minimum history entries needed to fit a trend.
    pub min_points: usize,
    /// Absolute slope (score points per day) beyond which the trend is no
    /// longer considered stable.
    pub slope_threshold: f64,
    /// Residual standard deviation beyond which the series is classified
    /// volatile, regardless of slope.
    pub volatility_threshold: f64,
    /// Residual deviations beyond this many sigmas are flagged as anomalies.
    pub anomaly_sigma: f64,
    /// Projection horizons, in days ahead of the newest entry.
    pub horizons: Vec<u32>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_points: 3,
            slope_threshold: 0.5,
            volatility_threshold: 12.0,
            anomaly_sigma: 2.0,
            horizons: vec![7, 30],
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> Result<(), TrendError> {
        if self.min_points < 3 {
            return Err(TrendError::InvalidConfig(
                "min_points must be at least 3".to_string(),
            ));
        }
        if self.slope_threshold <= 0.0 || self.volatility_threshold <= 0.0 {
            return Err(TrendError::InvalidConfig(
                "slope and volatility thresholds must be positive".to_string(),
            ));
        }
        if self.anomaly_sigma <= 0.0 {
            return Err(TrendError::InvalidConfig(
                "anomaly_sigma must be positive".to_string(),
            ));
        }
        if self.horizons.is_empty() {
            return Err(TrendError::InvalidConfig(
                "at least one projection horizon is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Timeouts for one dispatch call. The overall bound exists because the sum
/// of per-channel timeouts is otherwise unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub channel_timeout: Duration,
    pub overall_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_timeout: Duration::from_secs(10),
            overall_timeout: Duration::from_secs(30),
        }
    }
}

/// Process-level settings, read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub decaywatch_env: String,
    pub worker_concurrency: usize,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let database_url =
            std::env::var("DATABASE_URL").or_else(|_| std::env::var("DECAYWATCH_DATABASE_URL"))?;
        let decaywatch_env = std::env::var("DECAYWATCH_ENV").unwrap_or_else(|_| "dev".to_string());
        let worker_concurrency = std::env::var("DECAYWATCH_WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);
        let email_api_url = std::env::var("DECAYWATCH_EMAIL_API_URL")
            .unwrap_or_else(|_| "https://api.resend.com/emails".to_string());
        let email_api_key = std::env::var("DECAYWATCH_EMAIL_API_KEY")
            .or_else(|_| std::env::var("EMAIL_API_KEY"))?;
        let email_from = std::env::var("DECAYWATCH_EMAIL_FROM")
            .unwrap_or_else(|_| "alerts@decaywatch.dev".to_string());

        Ok(Self {
            database_url,
            decaywatch_env,
            worker_concurrency,
            email_api_url,
            email_api_key,
            email_from,
        })
    }
}
