pub mod envelope;
pub mod error;
pub mod push;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

pub use envelope::{Attributes, Envelope};
pub use error::{DeliveryError, DeliveryErrorKind};
pub use push::{PushMessage, PushRequest};

// ════════════════════════════════════════════════════════════════
//  Delivery
// ════════════════════════════════════════════════════════════════

/// Opaque id assigned by the delivery backend to a published message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single publish attempt.
pub type DeliveryResult = Result<MessageId, DeliveryError>;

/// Publishes outbound envelopes to a named destination.
///
/// Implementations are shared as `Arc<dyn DeliveryClient>` across concurrent
/// requests and must not require external locking. A call makes exactly one
/// attempt; retries are the upstream system's concern.
pub trait DeliveryClient: Send + Sync {
    /// Publish `envelope` to `topic`. Resolves once the backend acknowledged
    /// the message or the attempt failed.
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = DeliveryResult> + Send + 'a>>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
