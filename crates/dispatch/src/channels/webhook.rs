//! Generic webhook delivery: JSON POST to a user-configured URL, with an
//! optional HMAC-SHA256 signature so receivers can verify authenticity.

use std::time::Instant;

use chrono::{DateTime, Utc};
use decaywatch_core::signing::sign_payload;
use decaywatch_core::types::{
    AlertCategory, AlertPayload, AlertPriority, ChannelKind, ChannelResult, DeliveryErrorKind,
    UserAlertPreferences,
};
use serde::Serialize;

use super::{missing_config, outcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEnvelope<'a> {
    delivery_id: &'a str,
    category: AlertCategory,
    priority: AlertPriority,
    subject_url: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
    sent_at: DateTime<Utc>,
}

pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn send(
        &self,
        payload: &AlertPayload,
        prefs: &UserAlertPreferences,
    ) -> ChannelResult {
        let Some(config) = prefs.webhook.as_ref() else {
            return missing_config(ChannelKind::Webhook);
        };

        let delivery_id = format!("ntf_{}", nanoid::nanoid!(12));
        let sent_at = Utc::now();
        let envelope = WebhookEnvelope {
            delivery_id: &delivery_id,
            category: payload.category,
            priority: payload.priority,
            subject_url: &payload.subject_url,
            title: &payload.title,
            body: &payload.body,
            data: &payload.data,
            sent_at,
        };

        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(err) => {
                return ChannelResult::failure(
                    ChannelKind::Webhook,
                    DeliveryErrorKind::Unknown,
                    format!("failed to serialize payload: {}", err),
                    None,
                    None,
                )
            }
        };

        let timestamp = sent_at.timestamp();
        let mut request = self
            .client
            .post(&config.url)
            .header("Content-Type", "application/json")
            .header("X-Decaywatch-Timestamp", timestamp.to_string())
            .header("X-Decaywatch-Delivery-Id", delivery_id.clone());

        if let Some(secret) = config.secret.as_deref() {
            request = request.header(
                "X-Decaywatch-Signature",
                sign_payload(secret, timestamp, &body),
            );
        }

        let start = Instant::now();
        let result = request.body(body).send().await;

        outcome(ChannelKind::Webhook, result, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decaywatch_core::signing::verify_signature;
    use serde_json::json;

    fn envelope_body() -> (String, i64) {
        let sent_at: DateTime<Utc> = "2026-02-08T09:30:00Z".parse().unwrap();
        let data = json!({ "score": 63.0 });
        let envelope = WebhookEnvelope {
            delivery_id: "ntf_abc123",
            category: AlertCategory::Decay,
            priority: AlertPriority::High,
            subject_url: "https://example.com/guide",
            title: "Content decay detected",
            body: "Decay score reached 63.",
            data: &data,
            sent_at,
        };
        (serde_json::to_string(&envelope).unwrap(), sent_at.timestamp())
    }

    #[test]
    fn test_envelope_uses_camel_case_keys() {
        let (body, _) = envelope_body();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["deliveryId"], "ntf_abc123");
        assert_eq!(value["category"], "decay");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["subjectUrl"], "https://example.com/guide");
        assert_eq!(value["data"]["score"], 63.0);
        assert!(value.get("sentAt").is_some());
    }

    #[test]
    fn test_signature_over_envelope_verifies() {
        let (body, timestamp) = envelope_body();
        let signature = sign_payload("whsec_test", timestamp, &body);

        assert!(verify_signature("whsec_test", timestamp, &body, &signature));
        assert!(
            !verify_signature("whsec_test", timestamp + 1, &body, &signature),
            "replayed timestamp must fail"
        );
    }
}
