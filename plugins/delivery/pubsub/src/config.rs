use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";

pub const ENV_EMULATOR_HOST: &str = "PUBSUB_EMULATOR_HOST";
pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_ACCESS_TOKEN: &str = "PUBSUB_ACCESS_TOKEN";

/// Token endpoint of the GCE / Cloud Run metadata server.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// `[delivery]` section for `backend = "pubsub"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PubSubConfig {
    /// Project used to qualify short topic names.
    #[serde(default)]
    pub project: Option<String>,
    /// Base URL of the REST API, without the `/v1` suffix.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Fixed OAuth2 bearer token. Takes precedence over the metadata server.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Fetch tokens for the attached service account from the metadata
    /// server. Unset means: on, unless a token is given or the endpoint is
    /// plain http (emulator).
    #[serde(default)]
    pub metadata_auth: Option<bool>,
    /// Override of `METADATA_TOKEN_URL`.
    #[serde(default)]
    pub metadata_url: Option<String>,
}

impl PubSubConfig {
    /// Fill unset fields from the environment.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.project.is_none() {
            self.project = lookup(ENV_PROJECT).filter(|v| !v.is_empty());
        }
        if self.endpoint.is_none() {
            self.endpoint = lookup(ENV_EMULATOR_HOST)
                .filter(|v| !v.is_empty())
                .map(|host| format!("http://{host}"));
        }
        if self.access_token.is_none() {
            self.access_token = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.is_empty());
        }
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn metadata_url(&self) -> &str {
        self.metadata_url.as_deref().unwrap_or(METADATA_TOKEN_URL)
    }

    /// Whether requests are authenticated with metadata-server tokens.
    pub fn uses_metadata_server(&self) -> bool {
        self.access_token.is_none()
            && self
                .metadata_auth
                .unwrap_or_else(|| self.endpoint().starts_with("https://"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PubSubConfigError {
    #[error("topic '{0}' is not fully qualified and no project is configured")]
    MissingProject(String),

    #[error("empty topic name")]
    EmptyTopic,

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}
