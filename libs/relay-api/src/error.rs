/// Category of a delivery failure. Lets the caller tell a transient
/// backend hiccup from a request the backend will never accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// No acknowledgement within the publish timeout.
    Timeout,
    /// Network failure or backend overloaded (HTTP 429 / 5xx).
    Unavailable,
    /// Backend refused the request (auth, unknown topic, bad payload).
    Rejected,
    /// Backend answered with something we could not understand.
    Protocol,
}

impl DeliveryErrorKind {
    /// Whether a later attempt of the same publish may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, DeliveryErrorKind::Timeout | DeliveryErrorKind::Unavailable)
    }
}

impl std::fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryErrorKind::Timeout => f.write_str("timeout"),
            DeliveryErrorKind::Unavailable => f.write_str("unavailable"),
            DeliveryErrorKind::Rejected => f.write_str("rejected"),
            DeliveryErrorKind::Protocol => f.write_str("protocol"),
        }
    }
}

/// Failed publish: a `DeliveryErrorKind` plus a human-readable message.
#[derive(Clone, PartialEq, Eq)]
pub struct DeliveryError {
    kind: DeliveryErrorKind,
    message: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Timeout, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Unavailable, msg)
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Rejected, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Protocol, msg)
    }

    pub fn kind(&self) -> DeliveryErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DeliveryError {}
