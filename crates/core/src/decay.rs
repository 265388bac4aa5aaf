//! Decay scoring: turns a metrics window into a score, level, ranked
//! contributing factors, and recommendations.
//!
//! The calculator is pure and deterministic: identical input, config, and
//! `computed_at` always produce an identical result. Callers supply the
//! computation timestamp for exactly that reason.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::DecayDetectionConfig;
use crate::error::DecayError;
use crate::types::{
    ContributingFactor, DecayAnalysisInput, DecayAnalysisResult, DecayLevel, DecayOutcome,
    DecayRecommendation, DecayScore, MetricKind, MetricPoint, RecommendedAction,
};

/// Average metric values over one comparison window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PeriodStats {
    points: usize,
    clicks: f64,
    impressions: f64,
    position: f64,
    ctr: f64,
    total_clicks: u64,
    total_impressions: u64,
}

impl PeriodStats {
    fn from_points(points: &[&MetricPoint]) -> Self {
        let n = points.len();
        if n == 0 {
            return Self {
                points: 0,
                clicks: 0.0,
                impressions: 0.0,
                position: 0.0,
                ctr: 0.0,
                total_clicks: 0,
                total_impressions: 0,
            };
        }
        let total_clicks: u64 = points.iter().map(|p| p.clicks).sum();
        let total_impressions: u64 = points.iter().map(|p| p.impressions).sum();
        let divisor = n as f64;
        Self {
            points: n,
            clicks: total_clicks as f64 / divisor,
            impressions: total_impressions as f64 / divisor,
            position: points.iter().map(|p| p.position).sum::<f64>() / divisor,
            ctr: points.iter().map(|p| p.ctr).sum::<f64>() / divisor,
            total_clicks,
            total_impressions,
        }
    }

    fn is_silent(&self) -> bool {
        self.total_clicks == 0 && self.total_impressions == 0
    }
}

/// Percentage decline from baseline to recent, clamped to [0, 100].
///
/// Improvements clamp to zero: a metric that got better contributes nothing
/// to decay. A zero baseline yields zero, since there is nothing to decay
/// from.
fn decline_pct(baseline: f64, recent: f64) -> f64 {
    if baseline <= f64::EPSILON {
        return 0.0;
    }
    ((baseline - recent) / baseline * 100.0).clamp(0.0, 100.0)
}

/// Position is inverted: a larger position number is a worse rank, so a
/// position increase is decay.
fn position_decline_pct(baseline: f64, recent: f64) -> f64 {
    if baseline <= f64::EPSILON {
        return 0.0;
    }
    ((recent - baseline) / baseline * 100.0).clamp(0.0, 100.0)
}

/// Compute the decay score for one URL.
///
/// Returns `DecayOutcome::InsufficientData` when either comparison window
/// has fewer than `min_points_per_period` points. Config problems fail fast
/// before any computation.
pub fn compute_decay(
    input: &DecayAnalysisInput,
    config: &DecayDetectionConfig,
    computed_at: DateTime<Utc>,
) -> Result<DecayOutcome, DecayError> {
    config.validate()?;

    let mut points: Vec<&MetricPoint> = input.points.iter().collect();
    points.sort_by_key(|p| p.date);

    let newest: Option<NaiveDate> = points.last().map(|p| p.date);
    let (recent, baseline) = match newest {
        Some(newest) => partition_windows(&points, newest, config),
        None => (Vec::new(), Vec::new()),
    };

    if recent.len() < config.min_points_per_period
        || baseline.len() < config.min_points_per_period
    {
        return Ok(DecayOutcome::InsufficientData {
            points_recent: recent.len(),
            points_baseline: baseline.len(),
            required: config.min_points_per_period,
        });
    }

    let recent_stats = PeriodStats::from_points(&recent);
    let baseline_stats = PeriodStats::from_points(&baseline);

    // New or unindexed page: nothing happened in either window. Report a
    // clean bill of health with the flag set so callers do not alert on
    // silence.
    if recent_stats.is_silent() && baseline_stats.is_silent() {
        let score = DecayScore {
            url: input.url.clone(),
            user_id: input.user_id.clone(),
            score: 0.0,
            level: DecayLevel::Healthy,
            computed_at,
            no_activity: true,
            factors: Vec::new(),
        };
        return Ok(DecayOutcome::Scored(DecayAnalysisResult {
            score,
            recommendations: vec![DecayRecommendation {
                action: RecommendedAction::Monitor,
                reason: "No search activity in either period; nothing to compare yet."
                    .to_string(),
            }],
        }));
    }

    let declines = [
        (MetricKind::Clicks, decline_pct(baseline_stats.clicks, recent_stats.clicks)),
        (
            MetricKind::Impressions,
            decline_pct(baseline_stats.impressions, recent_stats.impressions),
        ),
        (
            MetricKind::Position,
            position_decline_pct(baseline_stats.position, recent_stats.position),
        ),
        (MetricKind::Ctr, decline_pct(baseline_stats.ctr, recent_stats.ctr)),
    ];

    let mut factors: Vec<ContributingFactor> = declines
        .iter()
        .map(|&(metric, delta_pct)| {
            let weight = config.weights.for_metric(metric);
            ContributingFactor {
                metric,
                delta_pct,
                weight,
                contribution: weight * delta_pct,
            }
        })
        .collect();
    factors.sort_by(|a, b| {
        b.contribution
            .partial_cmp(&a.contribution)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let raw: f64 = factors.iter().map(|f| f.contribution).sum();
    let score_value = raw.clamp(0.0, 100.0);
    let level = config.levels.level_for(score_value);
    let dominant = factors
        .first()
        .filter(|f| f.contribution > 0.0)
        .map(|f| f.metric);
    let recommendations = recommend(dominant, level);

    let score = DecayScore {
        url: input.url.clone(),
        user_id: input.user_id.clone(),
        score: score_value,
        level,
        computed_at,
        no_activity: false,
        factors,
    };

    Ok(DecayOutcome::Scored(DecayAnalysisResult {
        score,
        recommendations,
    }))
}

fn partition_windows<'a>(
    points: &[&'a MetricPoint],
    newest: NaiveDate,
    config: &DecayDetectionConfig,
) -> (Vec<&'a MetricPoint>, Vec<&'a MetricPoint>) {
    let recent_start = newest - Duration::days(config.recent_days as i64 - 1);
    let baseline_start = recent_start - Duration::days(config.baseline_days as i64);

    let mut recent = Vec::new();
    let mut baseline = Vec::new();
    for point in points {
        if point.date >= recent_start {
            recent.push(*point);
        } else if point.date >= baseline_start {
            baseline.push(*point);
        }
    }
    (recent, baseline)
}

/// Rule table mapping (dominant factor, level) to guidance.
fn recommend(dominant: Option<MetricKind>, level: DecayLevel) -> Vec<DecayRecommendation> {
    if level <= DecayLevel::Low {
        return vec![DecayRecommendation {
            action: RecommendedAction::Monitor,
            reason: "Performance is holding up; keep the page on the watch list.".to_string(),
        }];
    }

    let mut recs = Vec::new();
    match dominant {
        Some(MetricKind::Clicks) => {
            recs.push(DecayRecommendation {
                action: RecommendedAction::RefreshContent,
                reason: "Organic clicks are falling faster than other signals; update and expand the content.".to_string(),
            });
            if level >= DecayLevel::High {
                recs.push(DecayRecommendation {
                    action: RecommendedAction::ReviewKeywords,
                    reason: "Check whether the queries this page ranked for have shifted intent.".to_string(),
                });
            }
        }
        Some(MetricKind::Position) => {
            recs.push(DecayRecommendation {
                action: RecommendedAction::RebuildBacklinks,
                reason: "Average position slipped; competitors are likely out-ranking this page.".to_string(),
            });
            recs.push(DecayRecommendation {
                action: RecommendedAction::RefreshContent,
                reason: "Fresher content tends to recover lost positions.".to_string(),
            });
        }
        Some(MetricKind::Impressions) => {
            recs.push(DecayRecommendation {
                action: RecommendedAction::ReviewKeywords,
                reason: "Impressions dropped; the page is surfacing for fewer queries.".to_string(),
            });
            recs.push(DecayRecommendation {
                action: RecommendedAction::CheckTechnical,
                reason: "Verify indexing and crawlability; impression loss can be technical.".to_string(),
            });
        }
        Some(MetricKind::Ctr) => {
            recs.push(DecayRecommendation {
                action: RecommendedAction::RefreshContent,
                reason: "Click-through rate decayed; rewrite the title and meta description.".to_string(),
            });
        }
        None => {
            recs.push(DecayRecommendation {
                action: RecommendedAction::Monitor,
                reason: "No single metric dominates the decline.".to_string(),
            });
        }
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + Duration::days(offset)
    }

    fn computed_at() -> DateTime<Utc> {
        "2026-04-01T00:00:00Z".parse().unwrap()
    }

    /// 90 days of points: offsets 0..60 form the baseline window, 60..90 the
    /// recent window (with the default 30/60 day config).
    fn series(
        baseline: (u64, u64, f64, f64),
        recent: (u64, u64, f64, f64),
    ) -> DecayAnalysisInput {
        let mut points = Vec::new();
        for offset in 0..90 {
            let (clicks, impressions, position, ctr) =
                if offset < 60 { baseline } else { recent };
            points.push(MetricPoint {
                date: day(offset),
                clicks,
                impressions,
                position,
                ctr,
            });
        }
        DecayAnalysisInput {
            url: "https://example.com/guide".to_string(),
            user_id: "usr_1".to_string(),
            points,
            meta: Default::default(),
        }
    }

    fn scored(outcome: DecayOutcome) -> DecayAnalysisResult {
        match outcome {
            DecayOutcome::Scored(result) => result,
            other => panic!("expected scored outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_metrics_score_zero() {
        let input = series((100, 1000, 5.0, 0.1), (100, 1000, 5.0, 0.1));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        assert_eq!(result.score.score, 0.0);
        assert_eq!(result.score.level, DecayLevel::Healthy);
        assert!(!result.score.no_activity);
    }

    #[test]
    fn test_improvement_scores_zero() {
        // Everything got better: more clicks, better position.
        let input = series((100, 1000, 12.0, 0.1), (200, 2000, 4.0, 0.1));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        assert_eq!(result.score.score, 0.0);
        assert_eq!(result.score.level, DecayLevel::Healthy);
    }

    #[test]
    fn test_position_and_click_collapse_scores_high() {
        // Position 10 -> 25 (worse), clicks -60%, impressions flat, CTR -60%.
        let input = series((100, 1000, 10.0, 0.1), (40, 1000, 25.0, 0.04));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        assert!(
            result.score.level >= DecayLevel::High,
            "expected high or critical, got {:?} (score {})",
            result.score.level,
            result.score.score
        );

        let top_two: Vec<MetricKind> = result.score.factors[..2]
            .iter()
            .map(|f| f.metric)
            .collect();
        assert!(top_two.contains(&MetricKind::Position), "factors: {:?}", top_two);
        assert!(top_two.contains(&MetricKind::Clicks), "factors: {:?}", top_two);
    }

    #[test]
    fn test_total_collapse_stays_within_bounds() {
        let input = series((500, 10000, 3.0, 0.05), (0, 0, 99.0, 0.0));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        assert!(result.score.score <= 100.0);
        assert!(result.score.score >= 0.0);
        assert_eq!(result.score.level, DecayLevel::Critical);
    }

    #[test]
    fn test_factors_ranked_by_contribution() {
        let input = series((100, 1000, 10.0, 0.1), (40, 1000, 25.0, 0.04));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        let contributions: Vec<f64> = result.score.factors.iter().map(|f| f.contribution).collect();
        for pair in contributions.windows(2) {
            assert!(pair[0] >= pair[1], "factors not sorted: {:?}", contributions);
        }
        assert_eq!(result.score.factors.len(), 4, "all four metrics are reported");
    }

    #[test]
    fn test_insufficient_history_is_a_value_not_an_error() {
        let mut input = series((100, 1000, 5.0, 0.1), (100, 1000, 5.0, 0.1));
        input.points.truncate(10);

        let outcome =
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap();
        match outcome {
            DecayOutcome::InsufficientData { required, .. } => assert_eq!(required, 7),
            other => panic!("expected insufficient data, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_is_insufficient() {
        let input = DecayAnalysisInput {
            url: "https://example.com".to_string(),
            user_id: "usr_1".to_string(),
            points: Vec::new(),
            meta: Default::default(),
        };
        let outcome =
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap();
        assert!(matches!(outcome, DecayOutcome::InsufficientData { points_recent: 0, .. }));
    }

    #[test]
    fn test_all_zero_metrics_sets_no_activity() {
        let input = series((0, 0, 0.0, 0.0), (0, 0, 0.0, 0.0));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        assert!(result.score.no_activity);
        assert_eq!(result.score.level, DecayLevel::Healthy);
        assert_eq!(result.score.score, 0.0);
        assert!(result.score.factors.is_empty());
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let input = series((100, 1000, 10.0, 0.1), (40, 1000, 25.0, 0.04));
        let config = DecayDetectionConfig::default();
        let at = computed_at();

        let first = compute_decay(&input, &config, at).unwrap();
        let second = compute_decay(&input, &config, at).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unsorted_input_matches_sorted() {
        let sorted = series((100, 1000, 10.0, 0.1), (40, 1000, 25.0, 0.04));
        let mut shuffled = sorted.clone();
        shuffled.points.reverse();
        shuffled.points.swap(5, 40);

        let config = DecayDetectionConfig::default();
        assert_eq!(
            compute_decay(&sorted, &config, computed_at()).unwrap(),
            compute_decay(&shuffled, &config, computed_at()).unwrap()
        );
    }

    #[test]
    fn test_invalid_weights_fail_fast() {
        let input = series((100, 1000, 10.0, 0.1), (40, 1000, 25.0, 0.04));
        let config = DecayDetectionConfig {
            weights: crate::config::MetricWeights {
                clicks: 1.0,
                impressions: 1.0,
                position: 1.0,
                ctr: 1.0,
            },
            ..Default::default()
        };
        assert!(compute_decay(&input, &config, computed_at()).is_err());
    }

    #[test]
    fn test_click_decay_recommends_refresh() {
        // Clicks fall purely through CTR; impressions and position hold.
        let input = series((100, 1000, 5.0, 0.10), (30, 1000, 5.0, 0.03));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        // Clicks and CTR both dropped 70%; clicks carries the larger weight.
        assert_eq!(result.score.factors[0].metric, MetricKind::Clicks);
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.action == RecommendedAction::RefreshContent));
    }

    #[test]
    fn test_position_decay_recommends_backlinks() {
        let input = series((100, 1000, 5.0, 0.1), (60, 1000, 30.0, 0.06));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        assert_eq!(result.score.factors[0].metric, MetricKind::Position);
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.action == RecommendedAction::RebuildBacklinks));
    }

    #[test]
    fn test_healthy_page_gets_monitor_recommendation() {
        let input = series((100, 1000, 5.0, 0.1), (98, 990, 5.1, 0.099));
        let result = scored(
            compute_decay(&input, &DecayDetectionConfig::default(), computed_at()).unwrap(),
        );

        assert!(result.score.level <= DecayLevel::Low);
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].action, RecommendedAction::Monitor);
    }
}
