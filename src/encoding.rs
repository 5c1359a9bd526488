use crate::codec::CodecError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;

/// Wire serialization format, chosen once per connection.
///
/// `Binary` frames carry a hand-packed envelope with `bitcode`-serialized
/// payload bodies; `Text` frames are JSON envelopes with JSON payload
/// bodies. Both sides of a connection must agree on the encoding for its
/// entire lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    Binary,
    Text,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Binary => "binary",
            Encoding::Text => "text",
        }
    }

    /// Serializes a payload body with this encoding's body format.
    pub fn encode_payload<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Encoding::Binary => bitcode::serialize(value)
                .map_err(|e| CodecError::MalformedMessage(format!("payload encode failed: {e}"))),
            Encoding::Text => serde_json::to_vec(value)
                .map_err(|e| CodecError::MalformedMessage(format!("payload encode failed: {e}"))),
        }
    }

    /// Deserializes a payload body previously produced by
    /// [`Encoding::encode_payload`] under the same encoding.
    pub fn decode_payload<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Encoding::Binary => bitcode::deserialize(bytes)
                .map_err(|e| CodecError::MalformedMessage(format!("payload decode failed: {e}"))),
            Encoding::Text => serde_json::from_slice(bytes)
                .map_err(|e| CodecError::MalformedMessage(format!("payload decode failed: {e}"))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(Encoding::Binary),
            "text" => Ok(Encoding::Text),
            other => Err(UnknownEncoding(other.to_string())),
        }
    }
}

/// Returned when parsing an encoding name that is not part of the fixed set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownEncoding(pub String);

impl fmt::Display for UnknownEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown encoding: {:?}", self.0)
    }
}

impl std::error::Error for UnknownEncoding {}
