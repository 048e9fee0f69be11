use relay_api::DeliveryError;

use crate::transform::MalformedEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Body is not a valid push request.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("malformed envelope: {0}")]
    Malformed(#[from] MalformedEnvelope),

    #[error("delivery: {0}")]
    Delivery(#[from] DeliveryError),
}

impl RelayError {
    /// The caller sent something we will never accept.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RelayError::Parse(_) | RelayError::Malformed(_))
    }
}
