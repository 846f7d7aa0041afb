use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::DeliverySink;
use crate::constants::RELAY_USER_AGENT;
use crate::error::DeliveryError;

/// Body of a chat-bot incoming webhook text message.
#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    msg_type: &'static str,
    content: TextContent<'a>,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    text: &'a str,
}

/// Incoming-webhook sink (Lark/Feishu text message format).
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    /// Create a sink posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(RELAY_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        let body = TextMessage {
            msg_type: "text",
            content: TextContent { text: message },
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!(status = %status, error = %e, "Failed to read webhook response body");
                String::new()
            }
        };

        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        // The bot API answers 200 with a non-zero code for rejected messages
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            let code = value
                .get("code")
                .or_else(|| value.get("StatusCode"))
                .and_then(Value::as_i64);
            if let Some(code) = code.filter(|c| *c != 0) {
                return Err(DeliveryError::Rejected {
                    status: status.as_u16(),
                    body: format!("code {code}: {text}"),
                });
            }
        }

        debug!(status = %status, "Webhook accepted message");
        Ok(())
    }
}
