use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{ChannelConfig, OutgoingMessage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A sender that posts the message and its listing context as JSON.
pub struct WebhookSender {
    client: Client,
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookSender {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &OutgoingMessage<'_>,
    ) -> Result<(), SenderError> {
        let url = match config {
            ChannelConfig::Webhook { url } => url,
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "Expected Webhook config, but found a different type.".to_string(),
                ));
            }
        };
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SenderError::InvalidConfiguration(format!(
                "Webhook recipient is not an HTTP URL: {url}"
            )));
        }

        let response = self
            .client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(message)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::ListingStatus;
    use crate::monitoring::models::NotificationKind;
    use crate::notifications::models::NotificationContext;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context() -> NotificationContext {
        NotificationContext {
            listing_id: 9,
            url: "https://platform.test/car/9".to_string(),
            title: Some("Fiat Argo".to_string()),
            status: ListingStatus::Active,
            consignment_date: "01/02/2026".to_string(),
            deadline_date: "18/03/2026".to_string(),
            deadline_days: 45,
            days_elapsed: 41,
            days_remaining: 4,
            percent_elapsed: 91,
            consecutive_failures: 0,
        }
    }

    #[tokio::test]
    async fn posts_kind_text_and_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/listing"))
            .and(body_partial_json(json!({
                "kind": "deadline_warning",
                "text": "hurry",
                "context": { "listing_id": 9, "days_remaining": 4 }
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = context();
        let message = OutgoingMessage {
            kind: NotificationKind::DeadlineWarning,
            text: "hurry",
            context: &ctx,
        };
        let config = ChannelConfig::Webhook {
            url: format!("{}/hooks/listing", server.uri()),
        };
        WebhookSender::new().send(&config, &message).await.unwrap();
    }

    #[tokio::test]
    async fn server_error_is_a_send_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ctx = context();
        let message = OutgoingMessage {
            kind: NotificationKind::Sold,
            text: "sold",
            context: &ctx,
        };
        let config = ChannelConfig::Webhook { url: server.uri() };
        let err = WebhookSender::new().send(&config, &message).await.unwrap_err();
        assert!(matches!(err, SenderError::SendFailed(_)));
    }

    #[tokio::test]
    async fn non_http_recipient_is_rejected() {
        let ctx = context();
        let message = OutgoingMessage {
            kind: NotificationKind::Sold,
            text: "sold",
            context: &ctx,
        };
        let config = ChannelConfig::Webhook {
            url: "424242".to_string(),
        };
        let err = WebhookSender::new().send(&config, &message).await.unwrap_err();
        assert!(matches!(err, SenderError::InvalidConfiguration(_)));
    }
}
