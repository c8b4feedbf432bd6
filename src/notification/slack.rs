//! A transport that POSTs messages to a Slack incoming webhook.

use crate::core::{Message, RateLimitCounters, Transport};
use crate::notification::NotifyError;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use std::time::Duration;
use tokio::task;
use tracing::{debug, error, instrument};

/// Sends messages to a Slack webhook, one request per call.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    webhook_url: String,
    timeout: Duration,
}

impl WebhookTransport {
    /// Creates a new `WebhookTransport`.
    pub fn new(webhook_url: String, timeout: Duration) -> Self {
        Self {
            webhook_url,
            timeout,
        }
    }

    /// Sends the request in a blocking manner and classifies the response.
    fn send_request(
        client: reqwest::blocking::Client,
        webhook_url: &str,
        body: Vec<u8>,
    ) -> Result<(), NotifyError> {
        let response = client
            .post(webhook_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| {
                error!(error = %e, "HTTP request to Slack failed");
                NotifyError::Http(e)
            })?;

        let status = response.status();
        // Read the body to the end so the connection can be reused.
        let text = response.bytes().unwrap_or_default();

        if status.is_success() {
            debug!(status = %status, "Slack accepted the message");
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let counters: RateLimitCounters = serde_json::from_slice(&text).unwrap_or_default();
            return Err(NotifyError::RateLimited(counters));
        }

        error!(
            status = %status,
            body = %String::from_utf8_lossy(&text),
            "Slack returned an error status"
        );
        Err(NotifyError::Status(status.as_u16()))
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    #[instrument(skip(self, message), fields(attachments = message.attachments.len()))]
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(message)?;
        let webhook_url = self.webhook_url.clone();
        let timeout = self.timeout;

        task::spawn_blocking(move || {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()?;
            Self::send_request(client, &webhook_url, body)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Slack send task failed");
            NotifyError::Task(e.to_string())
        })?
    }
}

#[cfg(test)]
mod webhook_transport_tests {
    use super::*;
    use crate::core::{Attachment, Colour};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_message() -> Message {
        Message {
            user_name: "UnitTestBot".to_string(),
            channel: "#tests".to_string(),
            attachments: vec![Attachment {
                fallback: "Error: boom".to_string(),
                text: "boom".to_string(),
                colour: Colour::danger(),
                fields: vec![],
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_webhook_transport_success() {
        // Arrange
        let server = MockServer::start().await;
        let message = test_message();

        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(header("content-type", "application/json"))
            .and(body_json(&message))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            WebhookTransport::new(format!("{}/webhook", server.uri()), Duration::from_secs(5));

        // Act
        let result = transport.send(&message).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_transport_decodes_rate_limit_counters() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webhook"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "ok": false,
                "count_hour_ago": 300,
                "count_minute_ago": 120,
                "count_second_ago": 6
            })))
            .mount(&server)
            .await;

        let transport =
            WebhookTransport::new(format!("{}/webhook", server.uri()), Duration::from_secs(5));

        let result = transport.send(&test_message()).await;

        match result {
            Err(NotifyError::RateLimited(counters)) => {
                assert_eq!(counters.second, 6);
                assert_eq!(counters.minute, 120);
                assert_eq!(counters.hour, 300);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_webhook_transport_rate_limit_without_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let transport = WebhookTransport::new(server.uri(), Duration::from_secs(5));

        let result = transport.send(&test_message()).await;

        assert!(matches!(
            result,
            Err(NotifyError::RateLimited(RateLimitCounters { second: 0, minute: 0, .. }))
        ));
    }

    #[tokio::test]
    async fn test_webhook_transport_handles_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webhook"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let transport =
            WebhookTransport::new(format!("{}/webhook", server.uri()), Duration::from_secs(5));

        let result = transport.send(&test_message()).await;

        assert!(matches!(result, Err(NotifyError::Status(500))));
    }

    #[test]
    fn test_webhook_transport_handles_timeout() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
                .mount(&server)
                .await;

            let transport = WebhookTransport::new(server.uri(), Duration::from_millis(500));

            let result = transport.send(&test_message()).await;

            match result {
                Err(NotifyError::Http(e)) => assert!(e.is_timeout(), "expected a timeout: {}", e),
                other => panic!("expected Http timeout, got {:?}", other),
            }
        });
    }
}
