use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{DeliveryConfig, ServeArgs, ServerConfig, Settings};
use crate::error::ServerError;
use delivery_pubsub::PubSubDelivery;
use relay_api::DeliveryClient;
use relay_engine::{MemoryDelivery, Relay};

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("relay-server starting");

    // --- Load config ---
    let file = match &args.config {
        Some(path) => {
            let cfg = ServerConfig::load(path)?;
            tracing::info!(config = %path, "loaded config");
            cfg
        }
        None => ServerConfig::default(),
    };
    let settings = Settings::resolve(&args, file)?;

    // --- Delivery client ---
    let (client, topic) = build_delivery(&settings, |key| std::env::var(key).ok())?;
    let backend = client.name().to_string();
    let relay = Arc::new(Relay::new(client, topic).with_publish_timeout(settings.publish_timeout));
    tracing::info!(
        backend = %backend,
        topic = %relay.topic(),
        publish_timeout_ms = relay.publish_timeout().as_millis() as u64,
        "delivery client ready"
    );

    // --- API server ---
    let addr = settings.addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Serve(format!("bind {addr}: {e}")))?;

    tracing::info!("server ready");
    serve_until(listener, relay, shutdown_signal()).await
}

/// Serve until `shutdown` resolves, then give in-flight requests
/// `SHUTDOWN_GRACE` to finish before aborting the server task.
pub(crate) async fn serve_until<F>(
    listener: TcpListener,
    relay: Arc<Relay>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = Result<(), ServerError>>,
{
    let token = CancellationToken::new();
    let api_token = token.clone();
    let mut api_handle = tokio::spawn(relay_api_server::serve(listener, relay, api_token));

    tokio::select! {
        exited = &mut api_handle => {
            // Server stopped on its own.
            return match exited {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ServerError::Serve(e)),
                Err(e) => Err(ServerError::Serve(format!("api task: {e}"))),
            };
        }
        signal = shutdown => {
            if let Err(e) = signal {
                token.cancel();
                return Err(e);
            }
        }
    }

    tracing::info!("shutting down...");
    token.cancel();

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut api_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "api server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "api task failed"),
        Err(_) => {
            tracing::warn!(grace_s = SHUTDOWN_GRACE.as_secs(), "api server did not drain in time, aborting");
            api_handle.abort();
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or, on unix, SIGTERM.
async fn shutdown_signal() -> Result<(), ServerError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("received SIGINT");
            }
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received Ctrl+C");
        Ok(())
    }
}

/// Build the configured backend and the destination topic in the form it
/// expects. Any failure here is fatal at startup.
///
/// `env` is `std::env::var(..).ok()` in production.
fn build_delivery<F>(settings: &Settings, env: F) -> Result<(Arc<dyn DeliveryClient>, String), ServerError>
where
    F: Fn(&str) -> Option<String>,
{
    match &settings.delivery {
        DeliveryConfig::Pubsub(cfg) => {
            let cfg = cfg.clone().with_env(env);
            let delivery = PubSubDelivery::new(&cfg)?;
            let topic = delivery.topic_path(&settings.outgoing_topic)?;
            tracing::info!(
                endpoint = %delivery.endpoint(),
                auth = delivery.auth_mode(),
                "using pubsub delivery"
            );
            Ok((Arc::new(delivery), topic))
        }
        DeliveryConfig::Memory(cfg) => {
            tracing::warn!(
                max_messages = cfg.max_messages,
                "using in-memory delivery, messages are not forwarded anywhere"
            );
            Ok((
                Arc::new(MemoryDelivery::from_config(cfg)),
                settings.outgoing_topic.clone(),
            ))
        }
    }
}
