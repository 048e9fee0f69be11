use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tokio::sync::RwLock;

use relay_api::{now_ms, DeliveryClient, DeliveryResult, Envelope, MessageId};

// ═══════════════════════════════════════════════════════════════
//  MemoryDeliveryConfig
// ═══════════════════════════════════════════════════════════════

fn default_max_messages() -> usize {
    1_000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryDeliveryConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for MemoryDeliveryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryDelivery
// ═══════════════════════════════════════════════════════════════

/// A message accepted by `MemoryDelivery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub envelope: Envelope,
    pub message_id: MessageId,
    pub ts_ms: i64,
}

/// In-process delivery backend. Keeps the last `max_messages` publishes
/// in a ring buffer and never fails. Used for local runs without a
/// pub/sub backend and as a recording fake in tests.
pub struct MemoryDelivery {
    messages: RwLock<VecDeque<PublishedMessage>>,
    max_messages: usize,
    next_id: AtomicU64,
}

impl MemoryDelivery {
    pub fn new(max_messages: usize) -> Self {
        let max_messages = max_messages.max(1);
        Self {
            messages: RwLock::new(VecDeque::with_capacity(max_messages.min(4096))),
            max_messages,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &MemoryDeliveryConfig) -> Self {
        Self::new(config.max_messages)
    }

    /// Snapshot of retained messages, oldest first.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.messages.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl Default for MemoryDelivery {
    fn default() -> Self {
        Self::from_config(&MemoryDeliveryConfig::default())
    }
}

impl DeliveryClient for MemoryDelivery {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = DeliveryResult> + Send + 'a>> {
        Box::pin(async move {
            let message_id = MessageId::new(self.next_id.fetch_add(1, Ordering::Relaxed).to_string());
            let record = PublishedMessage {
                topic: topic.to_string(),
                envelope: envelope.clone(),
                message_id: message_id.clone(),
                ts_ms: now_ms(),
            };

            let mut buf = self.messages.write().await;
            if buf.len() >= self.max_messages {
                buf.pop_front();
            }
            buf.push_back(record);
            drop(buf);

            tracing::info!(
                topic,
                message_id = %message_id,
                source = %envelope.attributes.source,
                subject = %envelope.attributes.subject,
                bytes = envelope.data.len(),
                "memory delivery accepted message"
            );
            Ok(message_id)
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
