#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("no outgoing topic configured (set OUTGOING_MESSAGES_TOPIC or `outgoing_topic`)")]
    MissingTopic,

    #[error("pubsub: {0}")]
    PubSub(#[from] delivery_pubsub::PubSubConfigError),

    #[error("api server: {0}")]
    Serve(String),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
