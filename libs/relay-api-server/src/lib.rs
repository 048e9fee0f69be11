mod http;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use relay_engine::Relay;

pub use http::{HEALTH_BODY, PROCESSED_BODY};

#[derive(Clone)]
pub(crate) struct AppState {
    relay: Arc<Relay>,
}

/// Router with the health check and the push endpoint, both on `/`.
pub fn router(relay: Arc<Relay>) -> Router {
    let state = AppState { relay };

    Router::new()
        .route("/", get(http::handle_health).post(http::handle_push))
        .with_state(state)
}

/// Serve the relay HTTP API on `listener` until `shutdown` is cancelled.
///
/// Requests already in flight when the token fires are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    relay: Arc<Relay>,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(relay);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "relay api listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}
