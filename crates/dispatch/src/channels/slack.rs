//! Slack delivery via a user-configured incoming webhook.

use std::time::Instant;

use decaywatch_core::types::{AlertPayload, ChannelKind, ChannelResult, UserAlertPreferences};
use serde_json::{json, Value};

use super::{missing_config, outcome, priority_tag};

pub struct SlackSender {
    client: reqwest::Client,
}

impl SlackSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn send(
        &self,
        payload: &AlertPayload,
        prefs: &UserAlertPreferences,
    ) -> ChannelResult {
        let Some(config) = prefs.slack.as_ref() else {
            return missing_config(ChannelKind::Slack);
        };

        let message = build_message(payload);

        let start = Instant::now();
        let result = self
            .client
            .post(&config.webhook_url)
            .json(&message)
            .send()
            .await;

        outcome(ChannelKind::Slack, result, start)
    }
}

/// Block Kit message: header, body section, and a context line with the
/// category and subject URL.
fn build_message(payload: &AlertPayload) -> Value {
    let category = serde_json::to_value(payload.category)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    json!({
        "text": format!("[{}] {}", priority_tag(payload.priority), payload.title),
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": payload.title }
            },
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": payload.body }
            },
            {
                "type": "context",
                "elements": [
                    {
                        "type": "mrkdwn",
                        "text": format!("{} | <{}>", category, payload.subject_url)
                    }
                ]
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use decaywatch_core::types::{AlertCategory, AlertPriority};

    fn payload() -> AlertPayload {
        AlertPayload {
            category: AlertCategory::Decay,
            priority: AlertPriority::Critical,
            user_id: "usr_1".to_string(),
            subject_url: "https://example.com/guide".to_string(),
            title: "Critical decay".to_string(),
            body: "Score crossed 80.".to_string(),
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_message_has_fallback_text_and_blocks() {
        let message = build_message(&payload());

        assert_eq!(message["text"], "[CRITICAL] Critical decay");
        let blocks = message["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(blocks[0]["text"]["text"], "Critical decay");
        assert_eq!(blocks[1]["text"]["text"], "Score crossed 80.");
    }

    #[test]
    fn test_context_line_names_category_and_url() {
        let message = build_message(&payload());
        let context = message["blocks"][2]["elements"][0]["text"].as_str().unwrap();
        assert!(context.contains("decay"));
        assert!(context.contains("https://example.com/guide"));
    }
}
