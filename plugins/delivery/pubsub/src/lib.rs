mod auth;
pub mod config;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use relay_api::{DeliveryClient, DeliveryError, DeliveryResult, Envelope, MessageId};

use auth::TokenSource;

pub use config::{PubSubConfig, PubSubConfigError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// `PubsubMessage` has the same JSON shape as `Envelope`.
#[derive(Serialize)]
struct PublishRequest<'a> {
    messages: [&'a Envelope; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Delivery client for the Pub/Sub REST API (`topics.publish`).
///
/// One HTTP request per publish, no retries. Works against the
/// emulator when `endpoint` points at it.
pub struct PubSubDelivery {
    http: reqwest::Client,
    endpoint: String,
    project: Option<String>,
    tokens: TokenSource,
}

impl PubSubDelivery {
    pub fn new(config: &PubSubConfig) -> Result<Self, PubSubConfigError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            project: config.project.clone(),
            tokens: TokenSource::from_config(config),
        })
    }

    /// How requests are authenticated, for logging.
    pub fn auth_mode(&self) -> &'static str {
        self.tokens.describe()
    }

    /// Fully qualified topic: `projects/<project>/topics/<name>`.
    ///
    /// Names already starting with `projects/` are returned as is.
    pub fn topic_path(&self, topic: &str) -> Result<String, PubSubConfigError> {
        if topic.is_empty() {
            return Err(PubSubConfigError::EmptyTopic);
        }
        if topic.starts_with("projects/") {
            return Ok(topic.to_string());
        }
        match &self.project {
            Some(project) => Ok(format!("projects/{project}/topics/{topic}")),
            None => Err(PubSubConfigError::MissingProject(topic.to_string())),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, topic: &str, envelope: &Envelope) -> DeliveryResult {
        let path = self
            .topic_path(topic)
            .map_err(|e| DeliveryError::rejected(e.to_string()))?;
        let url = format!("{}/v1/{path}:publish", self.endpoint);

        let body = PublishRequest { messages: [envelope] };

        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = self.tokens.token(&self.http).await? {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::timeout(format!("pubsub request: {e}"))
            } else {
                DeliveryError::unavailable(format!("pubsub request: {e}"))
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let msg = format!("pubsub {status}: {}", text.trim());
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                DeliveryError::unavailable(msg)
            } else {
                DeliveryError::rejected(msg)
            });
        }

        let ack: PublishResponse = resp
            .json()
            .await
            .map_err(|e| DeliveryError::protocol(format!("pubsub response: {e}")))?;

        ack.message_ids
            .into_iter()
            .next()
            .map(MessageId::new)
            .ok_or_else(|| DeliveryError::protocol("pubsub response has no messageIds"))
    }
}

impl DeliveryClient for PubSubDelivery {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = DeliveryResult> + Send + 'a>> {
        Box::pin(async move {
            let result = self.send(topic, envelope).await;
            if let Err(e) = &result {
                tracing::debug!(topic, error = ?e, "pubsub publish failed");
            }
            result
        })
    }

    fn name(&self) -> &str {
        "pubsub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(project: Option<&str>) -> PubSubDelivery {
        PubSubDelivery::new(&PubSubConfig {
            project: project.map(str::to_string),
            endpoint: Some("http://localhost:8085/".into()),
            ..PubSubConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn short_topic_is_qualified_with_project() {
        let d = delivery(Some("demo"));
        assert_eq!(d.topic_path("pong").unwrap(), "projects/demo/topics/pong");
    }

    #[test]
    fn qualified_topic_is_kept() {
        let d = delivery(None);
        assert_eq!(
            d.topic_path("projects/other/topics/pong").unwrap(),
            "projects/other/topics/pong"
        );
    }

    #[test]
    fn short_topic_without_project_is_an_error() {
        let d = delivery(None);
        assert!(matches!(
            d.topic_path("pong"),
            Err(PubSubConfigError::MissingProject(t)) if t == "pong"
        ));
        assert!(matches!(d.topic_path(""), Err(PubSubConfigError::EmptyTopic)));
    }

    #[test]
    fn trailing_slash_is_trimmed_from_endpoint() {
        assert_eq!(delivery(None).endpoint(), "http://localhost:8085");
    }

    #[test]
    fn plain_http_endpoint_is_anonymous() {
        assert_eq!(delivery(None).auth_mode(), "anonymous");
        let real = PubSubDelivery::new(&PubSubConfig::default()).unwrap();
        assert_eq!(real.auth_mode(), "metadata server");
    }
}
