//! Body of an HTTP push delivery from the pub/sub system.
//!
//! ```json
//! {
//!   "message": {
//!     "data": "cGluZw==",
//!     "attributes": { "source": "a", "subject": "b" },
//!     "messageId": "136969346945",
//!     "publishTime": "2024-01-01T00:00:00Z"
//!   },
//!   "subscription": "projects/p/subscriptions/s",
//!   "deliveryAttempt": 1
//! }
//! ```

use serde::Deserialize;

use crate::envelope::{base64_bytes, Attributes, Envelope};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub delivery_attempt: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Required, may be empty.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Only `source` and `subject` are kept; anything else is ignored.
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,
}

impl PushRequest {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Split into the envelope and the inbound message id (for logging).
    pub fn into_envelope(self) -> (Envelope, Option<String>) {
        let PushMessage {
            data,
            attributes,
            message_id,
            ..
        } = self.message;
        (Envelope { data, attributes }, message_id)
    }
}
