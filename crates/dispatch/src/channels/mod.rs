//! Channel senders sharing a uniform send contract.
//!
//! Each sender is independently replaceable; a failure in one never
//! propagates to the others. Senders return a `ChannelResult`, never an
//! error.

pub mod email;
pub mod slack;
pub mod webhook;

use std::future::Future;
use std::time::Instant;

use decaywatch_core::types::{
    AlertPayload, AlertPriority, ChannelKind, ChannelResult, DeliveryErrorKind,
    UserAlertPreferences,
};

pub use email::{EmailProviderConfig, EmailSender};
pub use slack::SlackSender;
pub use webhook::WebhookSender;

/// Polymorphic send capability over the configured channels. Injected into
/// the dispatcher so tests can script outcomes without the network.
pub trait SenderPool: Send + Sync {
    fn send(
        &self,
        channel: ChannelKind,
        payload: &AlertPayload,
        prefs: &UserAlertPreferences,
    ) -> impl Future<Output = ChannelResult> + Send;
}

/// Production senders backed by one shared HTTP client.
pub struct HttpSenders {
    email: EmailSender,
    slack: SlackSender,
    webhook: WebhookSender,
}

impl HttpSenders {
    pub fn new(client: reqwest::Client, email_provider: EmailProviderConfig) -> Self {
        Self {
            email: EmailSender::new(client.clone(), email_provider),
            slack: SlackSender::new(client.clone()),
            webhook: WebhookSender::new(client),
        }
    }
}

impl SenderPool for HttpSenders {
    async fn send(
        &self,
        channel: ChannelKind,
        payload: &AlertPayload,
        prefs: &UserAlertPreferences,
    ) -> ChannelResult {
        match channel {
            ChannelKind::Email => self.email.send(payload, prefs).await,
            ChannelKind::Slack => self.slack.send(payload, prefs).await,
            ChannelKind::Webhook => self.webhook.send(payload, prefs).await,
        }
    }
}

/// Map an HTTP response status to the normalized failure taxonomy.
pub(crate) fn classify_status(status: u16) -> DeliveryErrorKind {
    match status {
        401 | 403 => DeliveryErrorKind::Auth,
        429 => DeliveryErrorKind::RateLimited,
        404 | 410 => DeliveryErrorKind::InvalidConfig,
        500..=599 => DeliveryErrorKind::Unreachable,
        _ => DeliveryErrorKind::Unknown,
    }
}

/// Map a transport-level error to the normalized failure taxonomy.
pub(crate) fn classify_transport(err: &reqwest::Error) -> DeliveryErrorKind {
    if err.is_timeout() || err.is_connect() {
        DeliveryErrorKind::Unreachable
    } else if err.is_builder() {
        DeliveryErrorKind::InvalidConfig
    } else {
        DeliveryErrorKind::Unknown
    }
}

/// Fold a reqwest send result into a `ChannelResult` with latency attached.
pub(crate) fn outcome(
    channel: ChannelKind,
    result: Result<reqwest::Response, reqwest::Error>,
    start: Instant,
) -> ChannelResult {
    let latency_ms = start.elapsed().as_millis() as i64;
    match result {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if resp.status().is_success() {
                ChannelResult::success(channel, Some(status), latency_ms)
            } else {
                ChannelResult::failure(
                    channel,
                    classify_status(status),
                    format!("HTTP {}", status),
                    Some(status),
                    Some(latency_ms),
                )
            }
        }
        Err(err) => ChannelResult::failure(
            channel,
            classify_transport(&err),
            err.to_string(),
            err.status().map(|s| s.as_u16()),
            Some(latency_ms),
        ),
    }
}

pub(crate) fn missing_config(channel: ChannelKind) -> ChannelResult {
    ChannelResult::failure(
        channel,
        DeliveryErrorKind::InvalidConfig,
        format!("{} channel not configured", channel),
        None,
        None,
    )
}

/// Short tag for subject lines and message headers.
pub(crate) fn priority_tag(priority: AlertPriority) -> &'static str {
    match priority {
        AlertPriority::Critical => "CRITICAL",
        AlertPriority::High => "HIGH",
        AlertPriority::Normal => "ALERT",
        AlertPriority::Low => "FYI",
    }
}
