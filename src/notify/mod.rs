//! Slack failure notifications
//!
//! Best-effort operator alerts for job and maintenance failures. Delivery is
//! fire-and-forget: transport problems are local log entries only and never
//! reach the caller or replace the error that triggered the alert. When
//! Slack is unconfigured the sink is a silent no-op.

use chrono::Utc;
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SlackConfig;

/// Slack Web API endpoint for posting messages.
pub const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

const ATTACHMENT_COLOR: &str = "#FF0000";

/// Fire-and-forget failure alert sink.
pub trait Notifier: Send + Sync {
    /// Deliver one alert. Never fails visibly.
    fn notify(&self, subject: &str, detail: &str);
}

/// Sink that drops everything; used when Slack is unconfigured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _subject: &str, _detail: &str) {}
}

/// `chat.postMessage` request body.
#[derive(Debug, Serialize)]
struct MessagePayload {
    channel: String,
    attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
struct Attachment {
    color: &'static str,
    text: String,
}

/// Posts red-attachment alerts to a Slack channel over the Web API.
pub struct SlackNotifier {
    config: SlackConfig,
    client: Client,
    endpoint: String,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            endpoint: SLACK_POST_MESSAGE_URL.to_string(),
        }
    }

    fn payload(&self, subject: &str, detail: &str) -> MessagePayload {
        let text = format!(
            "*Failed Steam Game Caching*\n\
             *Details:*\n\
             \u{2022} *Node Name:* `{}`\n\
             \u{2022} *Subject:* `{}`\n\
             \u{2022} *Error:* `{}`\n\
             \u{2022} *At:* `{}`",
            self.config.node_name,
            subject,
            detail,
            Utc::now().to_rfc3339(),
        );
        MessagePayload {
            channel: self.config.channel.clone(),
            attachments: vec![Attachment {
                color: ATTACHMENT_COLOR,
                text,
            }],
        }
    }
}

impl Notifier for SlackNotifier {
    fn notify(&self, subject: &str, detail: &str) {
        let payload = self.payload(subject, detail);
        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(err) => {
                warn!(subject, error = %err, "could not serialize slack payload");
                return;
            }
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.config.token)
            .body(body)
            .send();

        match response {
            Ok(res) if res.status().is_success() => {
                debug!(subject, "slack notification delivered");
            }
            Ok(res) => {
                warn!(subject, status = %res.status(), "slack rejected notification");
            }
            Err(err) => {
                warn!(subject, error = %err, "slack notification failed");
            }
        }
    }
}

/// Build the sink for a run: Slack when configured, otherwise a no-op.
pub fn for_config(slack: Option<&SlackConfig>) -> Box<dyn Notifier> {
    match slack {
        Some(config) => Box::new(SlackNotifier::new(config.clone())),
        None => Box::new(NoopNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slack_config() -> SlackConfig {
        SlackConfig {
            channel: "#game-cache".to_string(),
            token: "xoxb-test".to_string(),
            node_name: "cache-01".to_string(),
        }
    }

    #[test]
    fn payload_carries_channel_node_and_error() {
        let notifier = SlackNotifier::new(slack_config());
        let payload = notifier.payload("10", "No subscription");

        assert_eq!(payload.channel, "#game-cache");
        assert_eq!(payload.attachments.len(), 1);
        let attachment = &payload.attachments[0];
        assert_eq!(attachment.color, "#FF0000");
        assert!(attachment.text.contains("`cache-01`"));
        assert!(attachment.text.contains("`10`"));
        assert!(attachment.text.contains("`No subscription`"));
    }

    #[test]
    fn payload_serializes_to_slack_shape() {
        let notifier = SlackNotifier::new(slack_config());
        let value =
            serde_json::to_value(notifier.payload("subject", "detail")).unwrap();
        assert_eq!(value["channel"], "#game-cache");
        assert_eq!(value["attachments"][0]["color"], "#FF0000");
    }

    #[test]
    fn unconfigured_slack_yields_noop_sink() {
        // Must not panic or touch the network.
        let sink = for_config(None);
        sink.notify("subject", "detail");
    }
}
