use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use relay_api::{Attributes, DeliveryClient, DeliveryError, DeliveryErrorKind, DeliveryResult, Envelope};
use relay_engine::{MalformedEnvelope, MemoryDelivery, Relay, RelayError};

struct FailingDelivery(DeliveryError);

impl DeliveryClient for FailingDelivery {
    fn publish<'a>(
        &'a self,
        _topic: &'a str,
        _envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = DeliveryResult> + Send + 'a>> {
        let err = self.0.clone();
        Box::pin(async move { Err(err) })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct StalledDelivery;

impl DeliveryClient for StalledDelivery {
    fn publish<'a>(
        &'a self,
        _topic: &'a str,
        _envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = DeliveryResult> + Send + 'a>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(DeliveryError::unavailable("unreachable"))
        })
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

fn push_body(data_b64: &str, attributes: serde_json::Value) -> Vec<u8> {
    serde_json::json!({
        "message": {
            "data": data_b64,
            "attributes": attributes,
            "messageId": "in-1"
        },
        "subscription": "projects/p/subscriptions/ping-push"
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn relays_ping_as_pong() {
    let delivery = Arc::new(MemoryDelivery::new(16));
    let relay = Relay::new(delivery.clone(), "pong");

    // "X" in base64
    let body = push_body("WA==", serde_json::json!({"source": "a", "subject": "b"}));
    let relayed = relay.handle(&body).await.unwrap();
    assert_eq!(relayed.inbound_id.as_deref(), Some("in-1"));
    assert_eq!(relayed.message_id.as_str(), "1");

    let published = delivery.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "pong");
    assert_eq!(
        published[0].envelope,
        Envelope::new(b"X".to_vec(), Attributes::new("b", "a"))
    );
}

#[tokio::test]
async fn duplicate_pushes_publish_twice() {
    let delivery = Arc::new(MemoryDelivery::new(16));
    let relay = Relay::new(delivery.clone(), "pong");

    let body = push_body("WA==", serde_json::json!({"source": "a", "subject": "b"}));
    relay.handle(&body).await.unwrap();
    relay.handle(&body).await.unwrap();
    assert_eq!(delivery.len().await, 2);
}

#[tokio::test]
async fn malformed_envelope_is_never_published() {
    let delivery = Arc::new(MemoryDelivery::new(16));
    let relay = Relay::new(delivery.clone(), "pong");

    let body = push_body("WA==", serde_json::json!({"source": "a"}));
    let err = relay.handle(&body).await.unwrap_err();
    assert!(matches!(
        err,
        RelayError::Malformed(MalformedEnvelope::MissingAttribute("subject"))
    ));
    assert!(err.is_client_error());
    assert!(delivery.is_empty().await);
}

#[tokio::test]
async fn unparseable_body_is_a_parse_error() {
    let delivery = Arc::new(MemoryDelivery::new(16));
    let relay = Relay::new(delivery.clone(), "pong");

    let err = relay.handle(b"{\"message\":").await.unwrap_err();
    assert!(matches!(err, RelayError::Parse(_)));

    let err = relay
        .handle(&push_body("not base64!", serde_json::json!({"source": "a", "subject": "b"})))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Parse(_)));
    assert!(delivery.is_empty().await);
}

#[tokio::test]
async fn delivery_failure_is_surfaced() {
    let relay = Relay::new(
        Arc::new(FailingDelivery(DeliveryError::rejected("topic not found"))),
        "pong",
    );

    let err = relay
        .relay(Envelope::new(b"X".to_vec(), Attributes::new("a", "b")))
        .await
        .unwrap_err();
    match err {
        RelayError::Delivery(e) => {
            assert_eq!(e.kind(), DeliveryErrorKind::Rejected);
            assert!(!e.is_retryable());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn stalled_publish_times_out() {
    let relay = Relay::new(Arc::new(StalledDelivery), "pong")
        .with_publish_timeout(Duration::from_millis(20));

    let err = relay
        .relay(Envelope::new(b"X".to_vec(), Attributes::new("a", "b")))
        .await
        .unwrap_err();
    match err {
        RelayError::Delivery(e) => {
            assert_eq!(e.kind(), DeliveryErrorKind::Timeout);
            assert!(e.is_retryable());
            assert!(e.message().contains("stalled"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
