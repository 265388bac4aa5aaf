//! Email delivery through a transactional email provider's HTTP API.

use std::time::Instant;

use decaywatch_core::types::{AlertPayload, ChannelKind, ChannelResult, UserAlertPreferences};
use serde_json::json;

use super::{missing_config, outcome, priority_tag};

/// Provider-level email settings, shared across users. The recipient
/// address comes from per-user preferences.
#[derive(Debug, Clone)]
pub struct EmailProviderConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

pub struct EmailSender {
    client: reqwest::Client,
    provider: EmailProviderConfig,
}

impl EmailSender {
    pub fn new(client: reqwest::Client, provider: EmailProviderConfig) -> Self {
        Self { client, provider }
    }

    pub async fn send(
        &self,
        payload: &AlertPayload,
        prefs: &UserAlertPreferences,
    ) -> ChannelResult {
        let Some(config) = prefs.email.as_ref() else {
            return missing_config(ChannelKind::Email);
        };

        let message = json!({
            "from": self.provider.from,
            "to": [config.address],
            "subject": subject_line(payload),
            "html": render_html(payload),
        });

        let start = Instant::now();
        let result = self
            .client
            .post(&self.provider.api_url)
            .bearer_auth(&self.provider.api_key)
            .json(&message)
            .send()
            .await;

        outcome(ChannelKind::Email, result, start)
    }
}

fn subject_line(payload: &AlertPayload) -> String {
    format!("[{}] {}", priority_tag(payload.priority), payload.title)
}

fn render_html(payload: &AlertPayload) -> String {
    format!(
        "<h2>{}</h2><p>{}</p><p><a href=\"{url}\">{url}</a></p>",
        payload.title,
        payload.body,
        url = payload.subject_url,
    )
}
