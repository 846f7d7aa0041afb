//! Delivery sinks: where formatted messages go.

mod webhook;

use async_trait::async_trait;

use crate::error::DeliveryError;

pub use webhook::WebhookSink;

/// Downstream endpoint receiving one text message per new post.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver a message. One attempt, no retries.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if the endpoint is unreachable, times out or
    /// rejects the message.
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;
}
