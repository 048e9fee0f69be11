use serde::{Deserialize, Serialize};

/// Routing attributes carried next to the payload.
///
/// Absent attributes deserialize as empty strings; validation happens in
/// the transformer, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub subject: String,
}

impl Attributes {
    pub fn new(source: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            subject: subject.into(),
        }
    }
}

/// Logical message unit: opaque payload bytes plus source/subject.
///
/// `data` is never interpreted. On the JSON wire it travels as standard
/// base64.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Envelope {
    pub fn new(data: impl Into<Vec<u8>>, attributes: Attributes) -> Self {
        Self {
            data: data.into(),
            attributes,
        }
    }
}

/// Serde adapter: `Vec<u8>` <-> base64 string (standard alphabet, padded).
pub mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
