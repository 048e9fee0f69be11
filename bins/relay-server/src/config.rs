use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use delivery_pubsub::PubSubConfig;
use relay_engine::MemoryDeliveryConfig;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "relay-server", about = "Ping/pong pub/sub message relay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the push endpoint and relay messages
    Serve(ServeArgs),
}

/// Flags and env vars. Anything set here overrides the TOML file.
#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Path to an optional TOML config file
    #[arg(long, env = "RELAY_CONFIG")]
    pub config: Option<String>,

    /// Topic the swapped messages are published to
    #[arg(long, env = "OUTGOING_MESSAGES_TOPIC")]
    pub outgoing_topic: Option<String>,

    /// Listen address
    #[arg(long, env = "RELAY_HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Upper bound on a single publish, in milliseconds
    #[arg(long, env = "PUBLISH_TIMEOUT_MS")]
    pub publish_timeout_ms: Option<u64>,
}

// ---- TOML Config ----

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default)]
    pub outgoing_topic: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub publish_timeout_ms: Option<u64>,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// `[delivery]` section, selected by `backend` (default `"pubsub"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryConfig {
    Pubsub(PubSubConfig),
    Memory(MemoryDeliveryConfig),
}

const BACKENDS: &[&str] = &["pubsub", "memory"];

impl<'de> Deserialize<'de> for DeliveryConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut table = toml::Table::deserialize(deserializer)?;
        let backend = match table.remove("backend") {
            None => "pubsub".to_string(),
            Some(toml::Value::String(name)) => name,
            Some(other) => {
                return Err(de::Error::invalid_type(
                    de::Unexpected::Other(other.type_str()),
                    &"a backend name",
                ))
            }
        };

        // The remaining keys belong to the backend, which rejects unknown ones.
        let rest = toml::Value::Table(table);
        match backend.as_str() {
            "pubsub" => rest.try_into().map(DeliveryConfig::Pubsub).map_err(de::Error::custom),
            "memory" => rest.try_into().map(DeliveryConfig::Memory).map_err(de::Error::custom),
            other => Err(de::Error::unknown_variant(other, BACKENDS)),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig::Pubsub(PubSubConfig::default())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_publish_timeout_ms() -> u64 {
    10_000
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

// ---- Resolved settings ----

/// Effective configuration, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub outgoing_topic: String,
    pub addr: SocketAddr,
    pub publish_timeout: Duration,
    pub delivery: DeliveryConfig,
}

impl Settings {
    /// Merge CLI/env over file over defaults. A missing or empty topic is fatal.
    pub fn resolve(args: &ServeArgs, file: ServerConfig) -> Result<Self, ServerError> {
        let outgoing_topic = args
            .outgoing_topic
            .clone()
            .or(file.outgoing_topic)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ServerError::MissingTopic)?;

        let host = args.host.clone().or(file.host).unwrap_or_else(default_host);
        let ip: IpAddr = host.parse().map_err(|e| ServerError::Config {
            context: "host",
            detail: format!("'{host}': {e}"),
        })?;
        let port = args.port.or(file.port).unwrap_or_else(default_port);

        let timeout_ms = args
            .publish_timeout_ms
            .or(file.publish_timeout_ms)
            .unwrap_or_else(default_publish_timeout_ms);
        if timeout_ms == 0 {
            return Err(ServerError::Config {
                context: "publish_timeout_ms",
                detail: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            outgoing_topic,
            addr: SocketAddr::new(ip, port),
            publish_timeout: Duration::from_millis(timeout_ms),
            delivery: file.delivery,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(topic: Option<&str>) -> ServeArgs {
        ServeArgs {
            outgoing_topic: topic.map(str::to_string),
            ..ServeArgs::default()
        }
    }

    #[test]
    fn defaults_apply_without_file() {
        let settings = Settings::resolve(&args(Some("pong")), ServerConfig::default()).unwrap();
        assert_eq!(settings.outgoing_topic, "pong");
        assert_eq!(settings.addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.publish_timeout, Duration::from_secs(10));
        assert_eq!(settings.delivery, DeliveryConfig::default());
    }

    #[test]
    fn missing_topic_is_fatal() {
        let err = Settings::resolve(&args(None), ServerConfig::default()).unwrap_err();
        assert!(matches!(err, ServerError::MissingTopic));

        let err = Settings::resolve(&args(Some("  ")), ServerConfig::default()).unwrap_err();
        assert!(matches!(err, ServerError::MissingTopic));
    }

    #[test]
    fn file_values_are_used_when_flags_are_absent() {
        let file = ServerConfig::parse(
            r#"
            outgoing_topic = "pong-from-file"
            host = "127.0.0.1"
            port = 9000
            publish_timeout_ms = 250

            [delivery]
            backend = "memory"
            max_messages = 5
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(&args(None), file).unwrap();
        assert_eq!(settings.outgoing_topic, "pong-from-file");
        assert_eq!(settings.addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.publish_timeout, Duration::from_millis(250));
        assert_eq!(
            settings.delivery,
            DeliveryConfig::Memory(MemoryDeliveryConfig { max_messages: 5 })
        );
    }

    #[test]
    fn flags_override_file() {
        let file = ServerConfig::parse(
            r#"
            outgoing_topic = "from-file"
            port = 9000
            "#,
        )
        .unwrap();
        let cli = ServeArgs {
            outgoing_topic: Some("from-cli".into()),
            port: Some(7000),
            ..ServeArgs::default()
        };

        let settings = Settings::resolve(&cli, file).unwrap();
        assert_eq!(settings.outgoing_topic, "from-cli");
        assert_eq!(settings.addr.port(), 7000);
    }

    #[test]
    fn pubsub_section_parses() {
        let file = ServerConfig::parse(
            r#"
            [delivery]
            backend = "pubsub"
            project = "demo"
            endpoint = "http://localhost:8085"
            "#,
        )
        .unwrap();
        match file.delivery {
            DeliveryConfig::Pubsub(cfg) => {
                assert_eq!(cfg.project.as_deref(), Some("demo"));
                assert_eq!(cfg.endpoint(), "http://localhost:8085");
            }
            other => panic!("unexpected delivery config: {other:?}"),
        }
    }

    #[test]
    fn backend_defaults_to_pubsub() {
        let file = ServerConfig::parse("[delivery]\nproject = \"demo\"").unwrap();
        assert_eq!(
            file.delivery,
            DeliveryConfig::Pubsub(PubSubConfig {
                project: Some("demo".into()),
                ..PubSubConfig::default()
            })
        );

        let file = ServerConfig::parse("[delivery]").unwrap();
        assert_eq!(file.delivery, DeliveryConfig::default());
    }

    #[test]
    fn misspelled_backend_keys_are_rejected() {
        let err = ServerConfig::parse("[delivery]\nbackend = \"pubsub\"\nprojcet = \"demo\"").unwrap_err();
        assert!(err.to_string().contains("projcet"), "{err}");

        let err = ServerConfig::parse("[delivery]\nprojcet = \"demo\"").unwrap_err();
        assert!(err.to_string().contains("projcet"), "{err}");

        let err = ServerConfig::parse("[delivery]\nbackend = \"memory\"\nmax_mesages = 5").unwrap_err();
        assert!(err.to_string().contains("max_mesages"), "{err}");

        assert!(ServerConfig::parse("[delivery]\nbackend = 3").is_err());
    }

    #[test]
    fn bad_values_are_config_errors() {
        let cli = ServeArgs {
            host: Some("not-an-ip".into()),
            ..args(Some("pong"))
        };
        let err = Settings::resolve(&cli, ServerConfig::default()).unwrap_err();
        assert!(matches!(err, ServerError::Config { context: "host", .. }));

        let cli = ServeArgs {
            publish_timeout_ms: Some(0),
            ..args(Some("pong"))
        };
        let err = Settings::resolve(&cli, ServerConfig::default()).unwrap_err();
        assert!(matches!(err, ServerError::Config { context: "publish_timeout_ms", .. }));

        assert!(ServerConfig::parse("unknown_key = 1").is_err());
        assert!(ServerConfig::parse("[delivery]\nbackend = \"kafka\"").is_err());
    }

    #[test]
    fn env_var_names_are_stable() {
        use clap::CommandFactory;

        let cli = Cli::command();
        let serve = cli.find_subcommand("serve").unwrap();
        let env_of = |id: &str| {
            serve
                .get_arguments()
                .find(|a| a.get_id() == id)
                .and_then(|a| a.get_env())
                .and_then(|v| v.to_str())
                .map(str::to_string)
        };
        assert_eq!(env_of("host").as_deref(), Some("RELAY_HOST"));
        assert_eq!(env_of("port").as_deref(), Some("PORT"));
        assert_eq!(env_of("outgoing_topic").as_deref(), Some("OUTGOING_MESSAGES_TOPIC"));
        assert_eq!(env_of("publish_timeout_ms").as_deref(), Some("PUBLISH_TIMEOUT_MS"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ServerConfig::load("/nonexistent/relay.toml").unwrap_err();
        assert!(matches!(err, ServerError::Config { context: "read", .. }));
    }
}
