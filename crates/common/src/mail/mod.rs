//! Notification dispatch
//!
//! Email is sent through an external relay, fire-and-forget: a send is
//! spawned off the request path, failures are logged, and nothing is ever
//! rolled back because a notification could not be delivered.

use crate::config::MailConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What triggered the notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A recording was uploaded; the participant is asked to consent
    ConsentRequest,
    /// Someone replied to the recipient's annotation
    CommentReply,
    /// Someone replied within a thread on a session the recipient took part in
    ThreadReply,
}

/// One outbound notification
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient_email: String,
    pub recipient_name: String,
    pub project_title: String,
    /// Where the recipient should go: a consent link or a session page
    pub link: String,
}

/// Client for the notification relay
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    relay_url: Option<Arc<str>>,
    sender: Arc<str>,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    sender: &'a str,
    #[serde(flatten)]
    notification: &'a Notification,
}

impl Notifier {
    pub fn new(config: &MailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            relay_url: config.relay_url.as_deref().map(Arc::from),
            sender: Arc::from(config.sender.as_str()),
        }
    }

    /// Dispatch a notification without waiting for the outcome. With no
    /// relay configured (development) the notification is only logged.
    pub fn send(&self, notification: Notification) {
        let Some(relay_url) = self.relay_url.clone() else {
            debug!(
                kind = ?notification.kind,
                recipient = %notification.recipient_email,
                "No mail relay configured, dropping notification"
            );
            return;
        };

        let client = self.client.clone();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let payload = RelayPayload {
                sender: &sender,
                notification: &notification,
            };

            let outcome = client
                .post(relay_url.as_ref())
                .json(&payload)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match outcome {
                Ok(_) => debug!(
                    kind = ?notification.kind,
                    recipient = %notification.recipient_email,
                    "Notification dispatched"
                ),
                Err(e) => warn!(
                    kind = ?notification.kind,
                    recipient = %notification.recipient_email,
                    error = %e,
                    "Notification failed"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationKind::ConsentRequest).unwrap();
        assert_eq!(json, "\"consent_request\"");
    }

    #[tokio::test]
    async fn test_send_without_relay_is_a_noop() {
        let notifier = Notifier::new(&MailConfig {
            relay_url: None,
            sender: "noreply@gabber.audio".to_string(),
            timeout_secs: 1,
        });
        notifier.send(Notification {
            kind: NotificationKind::ConsentRequest,
            recipient_email: "ada@example.com".to_string(),
            recipient_name: "Ada".to_string(),
            project_title: "My Study".to_string(),
            link: "http://localhost/consent/abc".to_string(),
        });
    }
}
