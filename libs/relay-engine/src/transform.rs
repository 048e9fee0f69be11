use relay_api::{Attributes, Envelope};

/// Inbound envelope is missing a routing attribute.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEnvelope {
    #[error("attribute '{0}' is missing or empty")]
    MissingAttribute(&'static str),
}

/// Turn a ping into a pong: swap `source` and `subject`, keep `data` as is.
///
/// Pure and deterministic. Applying it twice yields the original
/// attributes.
pub fn transform(envelope: Envelope) -> Result<Envelope, MalformedEnvelope> {
    let Envelope { data, attributes } = envelope;
    let Attributes { source, subject } = attributes;

    if source.is_empty() {
        return Err(MalformedEnvelope::MissingAttribute("source"));
    }
    if subject.is_empty() {
        return Err(MalformedEnvelope::MissingAttribute("subject"));
    }

    Ok(Envelope {
        data,
        attributes: Attributes {
            source: subject,
            subject: source,
        },
    })
}
