use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use relay_api::DeliveryError;

use crate::config::PubSubConfig;

/// Refresh this long before the server-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Where the bearer token for a publish comes from.
pub(crate) enum TokenSource {
    /// Emulator: no auth header.
    Anonymous,
    Fixed(String),
    /// Service-account token from the metadata server, cached until
    /// shortly before it expires.
    Metadata {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl TokenSource {
    pub(crate) fn from_config(config: &PubSubConfig) -> Self {
        match &config.access_token {
            Some(token) => TokenSource::Fixed(token.clone()),
            None if config.uses_metadata_server() => TokenSource::Metadata {
                url: config.metadata_url().to_string(),
                cached: Mutex::new(None),
            },
            None => TokenSource::Anonymous,
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            TokenSource::Anonymous => "anonymous",
            TokenSource::Fixed(_) => "fixed token",
            TokenSource::Metadata { .. } => "metadata server",
        }
    }

    /// Current bearer token, fetching a fresh one when needed.
    pub(crate) async fn token(&self, http: &reqwest::Client) -> Result<Option<String>, DeliveryError> {
        match self {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Fixed(token) => Ok(Some(token.clone())),
            TokenSource::Metadata { url, cached } => {
                let mut guard = cached.lock().await;
                if let Some(token) = guard.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(Some(token.value.clone()));
                    }
                }

                let fresh = fetch_metadata_token(http, url).await?;
                let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
                tracing::debug!(expires_in_s = fresh.expires_in, "fetched metadata token");
                let value = fresh.access_token;
                *guard = Some(CachedToken {
                    value: value.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(Some(value))
            }
        }
    }

    /// Drop a cached token the backend refused.
    pub(crate) async fn invalidate(&self) {
        if let TokenSource::Metadata { cached, .. } = self {
            cached.lock().await.take();
        }
    }
}

async fn fetch_metadata_token(http: &reqwest::Client, url: &str) -> Result<MetadataToken, DeliveryError> {
    let resp = http
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| DeliveryError::unavailable(format!("metadata token request: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(DeliveryError::unavailable(format!(
            "metadata token {status}: {}",
            text.trim()
        )));
    }

    resp.json()
        .await
        .map_err(|e| DeliveryError::protocol(format!("metadata token response: {e}")))
}
