//! Trend analysis over a URL's decay history: least-squares slope,
//! classification, forward projection, and anomaly flagging.
//!
//! History is append-only by construction, so the analyzer requires sorted,
//! unique timestamps and refuses to guess when that contract is broken.

use chrono::Duration;

use crate::config::TrendConfig;
use crate::error::TrendError;
use crate::types::{
    DecayHistoryEntry, DecayTrendAnalysis, TrendAnomaly, TrendDirection, TrendOutcome,
    TrendProjection,
};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Classify the trend for one URL and project forward.
///
/// `window_days` is measured back from the newest entry. Fewer than
/// `config.min_points` entries in the window yield
/// `TrendOutcome::InsufficientData`.
pub fn analyze_trend(
    history: &[DecayHistoryEntry],
    window_days: u32,
    config: &TrendConfig,
) -> Result<TrendOutcome, TrendError> {
    config.validate()?;
    check_integrity(history)?;

    let window = match history.last() {
        Some(newest) => {
            let cutoff = newest.computed_at - Duration::days(window_days as i64);
            let start = history.partition_point(|e| e.computed_at < cutoff);
            &history[start..]
        }
        None => history,
    };

    let n = window.len();
    if n < config.min_points {
        return Ok(TrendOutcome::InsufficientData {
            points: n,
            required: config.min_points,
        });
    }

    let t0 = window[0].computed_at;
    let xs: Vec<f64> = window
        .iter()
        .map(|e| (e.computed_at - t0).num_seconds() as f64 / SECONDS_PER_DAY)
        .collect();
    let ys: Vec<f64> = window.iter().map(|e| e.score).collect();

    let nf = n as f64;
    let x_mean = xs.iter().sum::<f64>() / nf;
    let y_mean = ys.iter().sum::<f64>() / nf;

    let mut covariance = 0.0;
    let mut x_variance = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        covariance += (x - x_mean) * (y - y_mean);
        x_variance += (x - x_mean) * (x - x_mean);
    }
    // All points within the same instant cannot happen with unique
    // timestamps, but a sub-second span could still make this degenerate.
    let slope = if x_variance < 1e-9 {
        0.0
    } else {
        covariance / x_variance
    };
    let intercept = y_mean - slope * x_mean;

    let residuals: Vec<f64> = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| y - (intercept + slope * x))
        .collect();
    let residual_std =
        (residuals.iter().map(|r| r * r).sum::<f64>() / nf).sqrt();

    // Volatility takes precedence over the slope classification.
    let trend = if residual_std > config.volatility_threshold {
        TrendDirection::Volatile
    } else if slope > config.slope_threshold {
        TrendDirection::Declining
    } else if slope < -config.slope_threshold {
        TrendDirection::Improving
    } else {
        TrendDirection::Stable
    };

    let x_last = *xs.last().expect("window is non-empty");
    let projections = config
        .horizons
        .iter()
        .map(|&horizon_days| TrendProjection {
            horizon_days,
            score: (intercept + slope * (x_last + horizon_days as f64)).clamp(0.0, 100.0),
        })
        .collect();

    let anomalies = if residual_std > 1e-9 {
        window
            .iter()
            .zip(xs.iter().zip(&residuals))
            .filter(|(_, (_, r))| r.abs() > config.anomaly_sigma * residual_std)
            .map(|(entry, (x, r))| TrendAnomaly {
                computed_at: entry.computed_at,
                score: entry.score,
                expected: intercept + slope * x,
                deviation: *r,
            })
            .collect()
    } else {
        Vec::new()
    };

    let confidence = (nf / (nf + 3.0)) * (1.0 / (1.0 + residual_std / 10.0));

    Ok(TrendOutcome::Analyzed(DecayTrendAnalysis {
        trend,
        slope_per_day: slope,
        projections,
        confidence,
        anomalies,
        points_used: n,
    }))
}

/// History must be strictly ascending in `computed_at` for a single URL.
fn check_integrity(history: &[DecayHistoryEntry]) -> Result<(), TrendError> {
    for pair in history.windows(2) {
        if pair[1].computed_at <= pair[0].computed_at {
            return Err(TrendError::DataIntegrity(format!(
                "history entries out of order at {}",
                pair[1].computed_at
            )));
        }
        if pair[1].url != pair[0].url {
            return Err(TrendError::DataIntegrity(
                "history mixes entries for different urls".to_string(),
            ));
        }
    }
    Ok(())
}
