use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use relay_engine::RelayError;

use super::AppState;

pub const HEALTH_BODY: &str = "All good!";
pub const PROCESSED_BODY: &str = "Message processed";

// ═══════════════════════════════════════════════════════════════
//  GET /
// ═══════════════════════════════════════════════════════════════

/// Liveness only: does not touch the delivery client.
pub(crate) async fn handle_health() -> impl IntoResponse {
    HEALTH_BODY
}

// ═══════════════════════════════════════════════════════════════
//  POST /  (push delivery)
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_push(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    match state.relay.handle(&body).await {
        Ok(relayed) => {
            tracing::info!(
                topic = %state.relay.topic(),
                message_id = %relayed.message_id,
                inbound_id = relayed.inbound_id.as_deref().unwrap_or("-"),
                "message relayed"
            );
            (StatusCode::OK, PROCESSED_BODY.to_string())
        }
        Err(e) if e.is_client_error() => {
            tracing::warn!(error = %e, "rejected push");
            (StatusCode::BAD_REQUEST, format!("bad request: {e}"))
        }
        Err(e) => {
            let (kind, retryable) = match &e {
                RelayError::Delivery(d) => (Some(d.kind()), d.is_retryable()),
                _ => (None, false),
            };
            tracing::error!(
                topic = %state.relay.topic(),
                kind = ?kind,
                retryable,
                error = %e,
                "publish failed"
            );
            (StatusCode::BAD_GATEWAY, format!("publish failed: {e}"))
        }
    }
}
