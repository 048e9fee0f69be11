pub mod error;
pub mod memory;
pub mod transform;

use std::sync::Arc;
use std::time::Duration;

use relay_api::{DeliveryClient, DeliveryError, Envelope, MessageId, PushRequest};

pub use error::RelayError;
pub use memory::{MemoryDelivery, MemoryDeliveryConfig, PublishedMessage};
pub use transform::{transform, MalformedEnvelope};

/// Default bound on a single publish.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

// ═══════════════════════════════════════════════════════════════
//  Relay
// ═══════════════════════════════════════════════════════════════

/// Result of a relayed push delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relayed {
    /// Id assigned by the delivery backend to the outbound message.
    pub message_id: MessageId,
    /// Id of the inbound message, when the push body carried one.
    pub inbound_id: Option<String>,
}

/// Parse -> transform -> publish pipeline for one inbound message.
///
/// Holds no per-request state; a single instance serves all concurrent
/// requests. The destination topic is fixed at construction. Each call
/// makes at most one publish attempt. Upstream delivery is at-least-once,
/// so a redelivered push is published again.
pub struct Relay {
    client: Arc<dyn DeliveryClient>,
    topic: String,
    publish_timeout: Duration,
}

impl Relay {
    pub fn new(client: Arc<dyn DeliveryClient>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn publish_timeout(&self) -> Duration {
        self.publish_timeout
    }

    /// Handle a raw push body.
    pub async fn handle(&self, body: &[u8]) -> Result<Relayed, RelayError> {
        let request = PushRequest::from_slice(body)?;
        tracing::debug!(
            subscription = request.subscription.as_deref().unwrap_or("-"),
            inbound_id = request.message.message_id.as_deref().unwrap_or("-"),
            attempt = ?request.delivery_attempt,
            "received push"
        );

        let (envelope, inbound_id) = request.into_envelope();
        let message_id = self.relay(envelope).await?;
        Ok(Relayed {
            message_id,
            inbound_id,
        })
    }

    /// Transform an already parsed envelope and publish the result.
    pub async fn relay(&self, envelope: Envelope) -> Result<MessageId, RelayError> {
        let outbound = transform(envelope)?;

        let published = tokio::time::timeout(
            self.publish_timeout,
            self.client.publish(&self.topic, &outbound),
        )
        .await;

        let message_id = match published {
            Ok(result) => result?,
            Err(_) => {
                return Err(DeliveryError::timeout(format!(
                    "no acknowledgement from {} within {} ms",
                    self.client.name(),
                    self.publish_timeout.as_millis()
                ))
                .into());
            }
        };

        tracing::debug!(
            topic = %self.topic,
            message_id = %message_id,
            source = %outbound.attributes.source,
            subject = %outbound.attributes.subject,
            "published"
        );
        Ok(message_id)
    }
}
