//! Per-URL analysis job: score the metric window, append history, run the
//! trend fit, and trigger an alert when the score clears the user's bar.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use decaywatch_core::decay::compute_decay;
use decaywatch_core::error::GatewayError;
use decaywatch_core::gateway::{MetricsProvider, PersistenceGateway};
use decaywatch_core::trend::analyze_trend;
use decaywatch_core::types::{
    AlertCategory, AlertPayload, ContentMeta, DecayAnalysisInput, DecayAnalysisResult,
    DecayHistoryEntry, DecayLevel, DecayOutcome, DecayTrendAnalysis, MetricKind, TrendDirection,
};
use decaywatch_db::models::TrackedUrlRow;
use decaywatch_db::queries;
use nanoid::nanoid;
use tracing::{debug, info, warn};

use super::WorkerState;

/// Metric window handed to the calculator. Covers the recent and baseline
/// periods of the default detection config.
const METRIC_LOOKBACK_DAYS: u32 = 90;

/// History window for the trend fit.
const TREND_WINDOW_DAYS: u32 = 90;

pub async fn analyze_url(state: &WorkerState, tracked: &TrackedUrlRow) -> Result<()> {
    let points = state
        .gateway
        .fetch_metrics(&tracked.user_id, &tracked.url, METRIC_LOOKBACK_DAYS)
        .await?;

    let input = DecayAnalysisInput {
        url: tracked.url.clone(),
        user_id: tracked.user_id.clone(),
        points,
        meta: ContentMeta {
            published_at: tracked.published_at,
            updated_at: tracked.content_updated_at,
            word_count: tracked.word_count.map(|w| w.max(0) as u32),
        },
    };

    let result = match compute_decay(&input, &state.decay_config, Utc::now())? {
        DecayOutcome::Scored(result) => result,
        DecayOutcome::InsufficientData {
            points_recent,
            points_baseline,
            required,
        } => {
            debug!(
                url = %tracked.url,
                points_recent, points_baseline, required,
                "not enough data to score"
            );
            return Ok(());
        }
    };

    let previous =
        queries::history::latest(state.gateway.pool(), &tracked.user_id, &tracked.url).await?;
    let delta = previous.map(|prev| result.score.score - prev.score);

    let entry = DecayHistoryEntry {
        id: format!("hist_{}", nanoid!()),
        user_id: tracked.user_id.clone(),
        url: tracked.url.clone(),
        score: result.score.score,
        level: result.score.level,
        no_activity: result.score.no_activity,
        computed_at: result.score.computed_at,
        delta,
    };
    state.gateway.append_history_entry(&entry).await?;

    let history = state
        .gateway
        .get_history(&tracked.user_id, &tracked.url, TREND_WINDOW_DAYS)
        .await?;
    let trend = match analyze_trend(&history, TREND_WINDOW_DAYS, &state.trend_config) {
        Ok(outcome) => outcome.as_analysis().cloned(),
        Err(err) => {
            warn!(url = %tracked.url, error = %err, "trend analysis skipped");
            None
        }
    };

    if result.score.no_activity {
        debug!(url = %tracked.url, "page is silent in both periods; no alert");
        return Ok(());
    }

    maybe_alert(state, tracked, &result, trend.as_ref()).await
}

async fn maybe_alert(
    state: &WorkerState,
    tracked: &TrackedUrlRow,
    result: &DecayAnalysisResult,
    trend: Option<&DecayTrendAnalysis>,
) -> Result<()> {
    let prefs = match state.gateway.get_preferences(&tracked.user_id).await {
        Ok(prefs) => prefs,
        Err(GatewayError::NotFound(_)) => {
            debug!(user_id = %tracked.user_id, "no alert preferences; skipping alert");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if result.score.level < prefs.min_decay_level {
        return Ok(());
    }

    let last = state
        .gateway
        .last_alert_at(&tracked.user_id, &tracked.url, AlertCategory::Decay)
        .await?;
    if let Some(last) = last {
        if within_cooldown(last, Utc::now(), prefs.cooldown_hours) {
            debug!(url = %tracked.url, "within cool-down; skipping alert");
            return Ok(());
        }
    }

    if state.dry_run {
        info!(
            url = %tracked.url,
            score = result.score.score,
            "dry run; alert suppressed"
        );
        return Ok(());
    }

    let payload = build_payload(result, trend);
    let alert = state
        .dispatcher
        .dispatch_with_preferences(payload, &prefs)
        .await?;
    info!(
        alert_id = %alert.id,
        url = %tracked.url,
        status = ?alert.status,
        "alert dispatched"
    );
    Ok(())
}

fn within_cooldown(last_alert_at: DateTime<Utc>, now: DateTime<Utc>, cooldown_hours: u32) -> bool {
    now - last_alert_at < Duration::hours(cooldown_hours as i64)
}

fn build_payload(
    result: &DecayAnalysisResult,
    trend: Option<&DecayTrendAnalysis>,
) -> AlertPayload {
    let score = &result.score;
    let title = format!("Content decay detected: {}", score.url);

    let mut body = format!(
        "Decay score {:.1} ({}) for {}.",
        score.score,
        level_label(score.level),
        score.url
    );
    if let Some(factor) = score.factors.first() {
        body.push_str(&format!(
            " Largest decline: {} down {:.0}%.",
            metric_label(factor.metric),
            factor.delta_pct
        ));
    }
    if let Some(trend) = trend {
        body.push_str(&format!(
            " Trend: {} ({:+.2} per day).",
            direction_label(trend.trend),
            trend.slope_per_day
        ));
    }
    if let Some(rec) = result.recommendations.first() {
        body.push_str(&format!(" Suggested action: {}", rec.reason));
    }

    AlertPayload {
        category: AlertCategory::Decay,
        priority: score.level.priority(),
        user_id: score.user_id.clone(),
        subject_url: score.url.clone(),
        title,
        body,
        data: serde_json::json!({
            "score": score.score,
            "level": score.level,
            "factors": score.factors,
            "recommendations": result.recommendations,
            "trend": trend,
        }),
    }
}

fn level_label(level: DecayLevel) -> &'static str {
    match level {
        DecayLevel::Healthy => "healthy",
        DecayLevel::Low => "low",
        DecayLevel::Medium => "medium",
        DecayLevel::High => "high",
        DecayLevel::Critical => "critical",
    }
}

fn metric_label(metric: MetricKind) -> &'static str {
    match metric {
        MetricKind::Clicks => "clicks",
        MetricKind::Impressions => "impressions",
        MetricKind::Position => "average position",
        MetricKind::Ctr => "CTR",
    }
}

fn direction_label(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Improving => "improving",
        TrendDirection::Stable => "stable",
        TrendDirection::Declining => "declining",
        TrendDirection::Volatile => "volatile",
    }
}
