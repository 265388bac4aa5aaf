//! The dispatcher: the one orchestration component in the system.
//!
//! Given a trigger payload and the user's preferences it decides which
//! channels are eligible, fans sends out concurrently, aggregates per-channel
//! outcomes into a single alert record, and persists it. It never retries and
//! never deduplicates; both are the trigger's responsibility.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use decaywatch_core::config::DispatchConfig;
use decaywatch_core::gateway::PersistenceGateway;
use decaywatch_core::types::{
    Alert, AlertCategory, AlertPayload, AlertPriority, AlertStatus, ChannelKind, ChannelResult,
    DeliveryErrorKind, UserAlertPreferences,
};
use tracing::{info, warn};

use crate::channels::SenderPool;
use crate::error::DispatchError;

pub struct Dispatcher<S, G> {
    senders: Arc<S>,
    gateway: G,
    config: DispatchConfig,
}

impl<S, G> Dispatcher<S, G>
where
    S: SenderPool + 'static,
    G: PersistenceGateway,
{
    pub fn new(senders: S, gateway: G, config: DispatchConfig) -> Self {
        Self {
            senders: Arc::new(senders),
            gateway,
            config,
        }
    }

    /// Dispatch an alert, loading the user's preferences fresh from the
    /// gateway. Preferences are never cached across calls; they may change
    /// between dispatches.
    pub async fn dispatch(&self, payload: AlertPayload) -> Result<Alert, DispatchError> {
        let prefs = self
            .gateway
            .get_preferences(&payload.user_id)
            .await
            .map_err(DispatchError::PreferencesUnavailable)?;
        self.dispatch_with_preferences(payload, &prefs).await
    }

    /// Dispatch with preferences the caller already holds.
    ///
    /// The returned alert always itemizes per-channel outcomes, so a fully
    /// failed dispatch still explains why no notification arrived.
    pub async fn dispatch_with_preferences(
        &self,
        payload: AlertPayload,
        prefs: &UserAlertPreferences,
    ) -> Result<Alert, DispatchError> {
        let eligible = eligible_channels(&payload, prefs, Utc::now());
        let channel_results = if eligible.is_empty() {
            Vec::new()
        } else {
            self.fan_out(&payload, prefs, &eligible).await
        };
        let status = aggregate_status(&eligible, &channel_results);

        let alert = Alert {
            id: format!("alr_{}", nanoid::nanoid!(12)),
            user_id: payload.user_id.clone(),
            category: payload.category,
            priority: payload.priority,
            subject_url: payload.subject_url.clone(),
            title: payload.title.clone(),
            body: payload.body.clone(),
            status,
            channel_results,
            created_at: Utc::now(),
        };

        self.gateway
            .save_alert(&alert)
            .await
            .map_err(DispatchError::Store)?;

        info!(
            alert_id = %alert.id,
            status = ?alert.status,
            channels = alert.channel_results.len(),
            "alert dispatched"
        );
        Ok(alert)
    }

    /// Send a synthetic payload to exactly one channel so a user can verify
    /// their configuration. Bypasses mute and quiet-hours checks; still
    /// requires the channel to be configured. Not persisted.
    pub async fn send_test(
        &self,
        channel: ChannelKind,
        prefs: &UserAlertPreferences,
    ) -> Result<ChannelResult, DispatchError> {
        let configured = match channel {
            ChannelKind::Email => prefs.email.is_some(),
            ChannelKind::Slack => prefs.slack.is_some(),
            ChannelKind::Webhook => prefs.webhook.is_some(),
        };
        if !configured {
            return Err(DispatchError::ChannelNotConfigured(channel));
        }

        let payload = test_payload(&prefs.user_id);
        let result = match tokio::time::timeout(
            self.config.channel_timeout,
            self.senders.send(channel, &payload, prefs),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => timed_out(channel, self.config.channel_timeout.as_millis() as i64),
        };
        Ok(result)
    }

    async fn fan_out(
        &self,
        payload: &AlertPayload,
        prefs: &UserAlertPreferences,
        channels: &[ChannelKind],
    ) -> Vec<ChannelResult> {
        let mut handles = Vec::with_capacity(channels.len());
        for &channel in channels {
            let senders = Arc::clone(&self.senders);
            let payload = payload.clone();
            let prefs = prefs.clone();
            let channel_timeout = self.config.channel_timeout;
            // Spawned so an in-flight send runs to completion even if the
            // dispatching caller is cancelled; the attempt still gets logged.
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(
                    channel_timeout,
                    senders.send(channel, &payload, &prefs),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => timed_out(channel, channel_timeout.as_millis() as i64),
                }
            });
            handles.push((channel, handle));
        }

        // Outer bound: the sum of per-channel timeouts is unbounded otherwise.
        let deadline = tokio::time::Instant::now() + self.config.overall_timeout;
        let mut results = Vec::with_capacity(handles.len());
        for (channel, handle) in handles {
            let result = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => ChannelResult::failure(
                    channel,
                    DeliveryErrorKind::Unknown,
                    format!("send task failed: {}", join_err),
                    None,
                    None,
                ),
                Err(_) => ChannelResult::failure(
                    channel,
                    DeliveryErrorKind::Unknown,
                    "dispatch deadline exceeded".to_string(),
                    None,
                    None,
                ),
            };
            if !result.success {
                warn!(
                    channel = %channel,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "channel delivery failed"
                );
            }
            results.push(result);
        }
        results
    }
}

fn timed_out(channel: ChannelKind, latency_ms: i64) -> ChannelResult {
    ChannelResult::failure(
        channel,
        DeliveryErrorKind::Unreachable,
        "channel send timed out",
        None,
        Some(latency_ms),
    )
}

/// A channel is attempted only if it is configured and enabled, the payload's
/// category is not muted, and quiet hours do not apply. Critical priority
/// bypasses quiet hours.
pub fn eligible_channels(
    payload: &AlertPayload,
    prefs: &UserAlertPreferences,
    now: DateTime<Utc>,
) -> Vec<ChannelKind> {
    if prefs.muted_categories.contains(&payload.category) {
        return Vec::new();
    }
    if payload.priority != AlertPriority::Critical {
        if let Some(quiet) = prefs.quiet_hours {
            if quiet.contains(now.hour() as u8) {
                return Vec::new();
            }
        }
    }

    let mut channels = Vec::new();
    if prefs.email.as_ref().is_some_and(|c| c.enabled) {
        channels.push(ChannelKind::Email);
    }
    if prefs.slack.as_ref().is_some_and(|c| c.enabled) {
        channels.push(ChannelKind::Slack);
    }
    if prefs.webhook.as_ref().is_some_and(|c| c.enabled) {
        channels.push(ChannelKind::Webhook);
    }
    channels
}

/// `Sent` if at least one channel succeeded, `Failed` only if every attempted
/// channel failed, `Pending` when nothing was eligible to attempt.
pub fn aggregate_status(eligible: &[ChannelKind], results: &[ChannelResult]) -> AlertStatus {
    if eligible.is_empty() {
        AlertStatus::Pending
    } else if results.iter().any(|r| r.success) {
        AlertStatus::Sent
    } else {
        AlertStatus::Failed
    }
}

fn test_payload(user_id: &str) -> AlertPayload {
    AlertPayload {
        category: AlertCategory::Decay,
        priority: AlertPriority::Low,
        user_id: user_id.to_string(),
        subject_url: "https://example.com".to_string(),
        title: "Test alert".to_string(),
        body: "This is a test notification to verify your channel configuration.".to_string(),
        data: serde_json::json!({ "test": true }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decaywatch_core::error::GatewayError;
    use decaywatch_core::types::{
        AlertAction, DecayHistoryEntry, DecayLevel, EmailChannelConfig, QuietHours,
        SlackChannelConfig, WebhookChannelConfig,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Script {
        Succeed,
        Fail(DeliveryErrorKind),
        Hang,
    }

    struct FakeSenders {
        scripts: HashMap<ChannelKind, Script>,
    }

    impl FakeSenders {
        fn new(scripts: &[(ChannelKind, Script)]) -> Self {
            Self {
                scripts: scripts.iter().copied().collect(),
            }
        }
    }

    impl SenderPool for FakeSenders {
        async fn send(
            &self,
            channel: ChannelKind,
            _payload: &AlertPayload,
            _prefs: &UserAlertPreferences,
        ) -> ChannelResult {
            match self.scripts.get(&channel).copied().unwrap_or(Script::Succeed) {
                Script::Succeed => ChannelResult::success(channel, Some(200), 5),
                Script::Fail(kind) => {
                    ChannelResult::failure(channel, kind, "scripted failure", Some(500), Some(5))
                }
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    ChannelResult::success(channel, Some(200), 60_000)
                }
            }
        }
    }

    #[derive(Clone, Default)]
    struct FakeGateway {
        prefs: Option<UserAlertPreferences>,
        saved: Arc<Mutex<Vec<Alert>>>,
    }

    impl PersistenceGateway for FakeGateway {
        async fn get_history(
            &self,
            _user_id: &str,
            _url: &str,
            _window_days: u32,
        ) -> Result<Vec<DecayHistoryEntry>, GatewayError> {
            Ok(Vec::new())
        }

        async fn append_history_entry(
            &self,
            _entry: &DecayHistoryEntry,
        ) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn get_preferences(
            &self,
            user_id: &str,
        ) -> Result<UserAlertPreferences, GatewayError> {
            self.prefs
                .clone()
                .ok_or_else(|| GatewayError::NotFound(format!("preferences for {}", user_id)))
        }

        async fn save_alert(&self, alert: &Alert) -> Result<(), GatewayError> {
            self.saved.lock().unwrap().push(alert.clone());
            Ok(())
        }

        async fn last_alert_at(
            &self,
            _user_id: &str,
            _subject_url: &str,
            _category: AlertCategory,
        ) -> Result<Option<DateTime<Utc>>, GatewayError> {
            Ok(None)
        }

        async fn update_alert_status(
            &self,
            _alert_id: &str,
            _action: AlertAction,
        ) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn prefs_all_enabled() -> UserAlertPreferences {
        UserAlertPreferences {
            user_id: "usr_1".to_string(),
            email: Some(EmailChannelConfig {
                enabled: true,
                address: "owner@example.com".to_string(),
            }),
            slack: Some(SlackChannelConfig {
                enabled: true,
                webhook_url: "https://hooks.slack.com/services/T/B/x".to_string(),
            }),
            webhook: Some(WebhookChannelConfig {
                enabled: true,
                url: "https://example.com/hooks/decay".to_string(),
                secret: Some("whsec_test".to_string()),
            }),
            muted_categories: Vec::new(),
            min_decay_level: DecayLevel::Medium,
            quiet_hours: None,
            cooldown_hours: 24,
        }
    }

    fn payload(priority: AlertPriority) -> AlertPayload {
        AlertPayload {
            category: AlertCategory::Decay,
            priority,
            user_id: "usr_1".to_string(),
            subject_url: "https://example.com/guide".to_string(),
            title: "Content decay detected".to_string(),
            body: "Score reached 63.".to_string(),
            data: serde_json::Value::Null,
        }
    }

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            channel_timeout: Duration::from_millis(50),
            overall_timeout: Duration::from_secs(5),
        }
    }

    fn at_hour(hour: u32) -> DateTime<Utc> {
        format!("2026-02-08T{:02}:30:00Z", hour).parse().unwrap()
    }

    #[tokio::test]
    async fn test_one_failing_channel_does_not_block_the_others() {
        let senders = FakeSenders::new(&[
            (ChannelKind::Email, Script::Succeed),
            (ChannelKind::Slack, Script::Fail(DeliveryErrorKind::RateLimited)),
            (ChannelKind::Webhook, Script::Succeed),
        ]);
        let gateway = FakeGateway::default();
        let dispatcher = Dispatcher::new(senders, gateway, fast_config());

        let alert = dispatcher
            .dispatch_with_preferences(payload(AlertPriority::High), &prefs_all_enabled())
            .await
            .unwrap();

        assert_eq!(alert.status, AlertStatus::Sent);
        assert_eq!(alert.channel_results.len(), 3);

        let slack = alert
            .channel_results
            .iter()
            .find(|r| r.channel == ChannelKind::Slack)
            .unwrap();
        assert!(!slack.success);
        assert_eq!(slack.error_kind, Some(DeliveryErrorKind::RateLimited));

        let successes = alert.channel_results.iter().filter(|r| r.success).count();
        assert_eq!(successes, 2);
    }

    #[tokio::test]
    async fn test_all_channels_failing_yields_failed_with_itemized_reasons() {
        let senders = FakeSenders::new(&[
            (ChannelKind::Email, Script::Fail(DeliveryErrorKind::Auth)),
            (ChannelKind::Slack, Script::Fail(DeliveryErrorKind::Unreachable)),
            (ChannelKind::Webhook, Script::Fail(DeliveryErrorKind::Unknown)),
        ]);
        let dispatcher = Dispatcher::new(senders, FakeGateway::default(), fast_config());

        let alert = dispatcher
            .dispatch_with_preferences(payload(AlertPriority::High), &prefs_all_enabled())
            .await
            .unwrap();

        assert_eq!(alert.status, AlertStatus::Failed);
        assert_eq!(alert.channel_results.len(), 3);
        assert!(alert.channel_results.iter().all(|r| !r.success));
        assert!(alert.channel_results.iter().all(|r| r.error_kind.is_some()));
    }

    #[tokio::test]
    async fn test_hanging_channel_times_out_as_unreachable() {
        let senders = FakeSenders::new(&[(ChannelKind::Slack, Script::Hang)]);
        let dispatcher = Dispatcher::new(senders, FakeGateway::default(), fast_config());

        let alert = dispatcher
            .dispatch_with_preferences(payload(AlertPriority::High), &prefs_all_enabled())
            .await
            .unwrap();

        assert_eq!(alert.status, AlertStatus::Sent, "email and webhook still went out");
        let slack = alert
            .channel_results
            .iter()
            .find(|r| r.channel == ChannelKind::Slack)
            .unwrap();
        assert!(!slack.success);
        assert_eq!(slack.error_kind, Some(DeliveryErrorKind::Unreachable));
    }

    #[tokio::test]
    async fn test_overall_deadline_finalizes_pending_channels_as_unknown() {
        // Per-channel timeout far beyond the overall bound, so only the
        // dispatch deadline can cut the hanging sends off.
        let senders = FakeSenders::new(&[
            (ChannelKind::Email, Script::Hang),
            (ChannelKind::Slack, Script::Hang),
            (ChannelKind::Webhook, Script::Hang),
        ]);
        let config = DispatchConfig {
            channel_timeout: Duration::from_secs(10),
            overall_timeout: Duration::from_millis(100),
        };
        let dispatcher = Dispatcher::new(senders, FakeGateway::default(), config);

        let alert = dispatcher
            .dispatch_with_preferences(payload(AlertPriority::High), &prefs_all_enabled())
            .await
            .unwrap();

        assert_eq!(alert.status, AlertStatus::Failed);
        assert_eq!(alert.channel_results.len(), 3, "every attempt is still itemized");
        for result in &alert.channel_results {
            assert!(!result.success);
            assert_eq!(
                result.error_kind,
                Some(DeliveryErrorKind::Unknown),
                "deadline-cut channels are finalized as unknown, not unreachable"
            );
        }
    }

    #[tokio::test]
    async fn test_muted_category_yields_pending_with_no_attempts() {
        let mut prefs = prefs_all_enabled();
        prefs.muted_categories = vec![AlertCategory::Decay];
        let dispatcher =
            Dispatcher::new(FakeSenders::new(&[]), FakeGateway::default(), fast_config());

        let alert = dispatcher
            .dispatch_with_preferences(payload(AlertPriority::High), &prefs)
            .await
            .unwrap();

        assert_eq!(alert.status, AlertStatus::Pending);
        assert!(alert.channel_results.is_empty());
    }

    #[tokio::test]
    async fn test_alert_is_persisted_exactly_once() {
        let gateway = FakeGateway::default();
        let saved = Arc::clone(&gateway.saved);
        let dispatcher = Dispatcher::new(FakeSenders::new(&[]), gateway, fast_config());

        let alert = dispatcher
            .dispatch_with_preferences(payload(AlertPriority::Normal), &prefs_all_enabled())
            .await
            .unwrap();

        let stored = saved.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, alert.id);
        assert_eq!(stored[0].status, AlertStatus::Sent);
    }

    #[tokio::test]
    async fn test_dispatch_without_preferences_fails_before_any_send() {
        let dispatcher = Dispatcher::new(
            FakeSenders::new(&[]),
            FakeGateway::default(), // no preferences stored
            fast_config(),
        );

        let err = dispatcher.dispatch(payload(AlertPriority::High)).await.unwrap_err();
        assert!(matches!(err, DispatchError::PreferencesUnavailable(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_dispatch_loads_preferences_from_gateway() {
        let gateway = FakeGateway {
            prefs: Some(prefs_all_enabled()),
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(FakeSenders::new(&[]), gateway, fast_config());

        let alert = dispatcher.dispatch(payload(AlertPriority::High)).await.unwrap();
        assert_eq!(alert.status, AlertStatus::Sent);
        assert_eq!(alert.channel_results.len(), 3);
    }

    #[tokio::test]
    async fn test_send_test_requires_a_configured_channel() {
        let mut prefs = prefs_all_enabled();
        prefs.slack = None;
        let dispatcher =
            Dispatcher::new(FakeSenders::new(&[]), FakeGateway::default(), fast_config());

        let err = dispatcher
            .send_test(ChannelKind::Slack, &prefs)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ChannelNotConfigured(ChannelKind::Slack)));
    }

    #[tokio::test]
    async fn test_send_test_bypasses_mute_and_quiet_hours() {
        let mut prefs = prefs_all_enabled();
        prefs.muted_categories = vec![AlertCategory::Decay];
        prefs.quiet_hours = Some(QuietHours { start_hour: 0, end_hour: 23 });
        let dispatcher =
            Dispatcher::new(FakeSenders::new(&[]), FakeGateway::default(), fast_config());

        let result = dispatcher
            .send_test(ChannelKind::Email, &prefs)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.channel, ChannelKind::Email);
    }

    #[test]
    fn test_quiet_hours_suppress_non_critical() {
        let mut prefs = prefs_all_enabled();
        prefs.quiet_hours = Some(QuietHours { start_hour: 22, end_hour: 6 });

        let during = eligible_channels(&payload(AlertPriority::High), &prefs, at_hour(23));
        assert!(during.is_empty());

        let outside = eligible_channels(&payload(AlertPriority::High), &prefs, at_hour(12));
        assert_eq!(outside.len(), 3);
    }

    #[test]
    fn test_critical_priority_bypasses_quiet_hours() {
        let mut prefs = prefs_all_enabled();
        prefs.quiet_hours = Some(QuietHours { start_hour: 22, end_hour: 6 });

        let channels = eligible_channels(&payload(AlertPriority::Critical), &prefs, at_hour(23));
        assert_eq!(channels.len(), 3);
    }

    #[test]
    fn test_disabled_and_unconfigured_channels_are_skipped() {
        let mut prefs = prefs_all_enabled();
        prefs.email.as_mut().unwrap().enabled = false;
        prefs.webhook = None;

        let channels = eligible_channels(&payload(AlertPriority::High), &prefs, at_hour(12));
        assert_eq!(channels, vec![ChannelKind::Slack]);
    }

    #[test]
    fn test_aggregate_status_rules() {
        let eligible = [ChannelKind::Email, ChannelKind::Slack];
        let one_ok = [
            ChannelResult::success(ChannelKind::Email, Some(200), 5),
            ChannelResult::failure(
                ChannelKind::Slack,
                DeliveryErrorKind::Unreachable,
                "down",
                None,
                None,
            ),
        ];
        assert_eq!(aggregate_status(&eligible, &one_ok), AlertStatus::Sent);

        let all_failed = [
            ChannelResult::failure(ChannelKind::Email, DeliveryErrorKind::Auth, "401", Some(401), None),
            ChannelResult::failure(
                ChannelKind::Slack,
                DeliveryErrorKind::Unreachable,
                "down",
                None,
                None,
            ),
        ];
        assert_eq!(aggregate_status(&eligible, &all_failed), AlertStatus::Failed);

        assert_eq!(aggregate_status(&[], &[]), AlertStatus::Pending);
    }
}
