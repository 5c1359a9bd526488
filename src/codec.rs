use crate::constants::{
    RESPONSE_STATUS_ERROR, RESPONSE_STATUS_OK, WIRE_HEADER_SIZE, WIRE_KIND_NOTIFICATION,
    WIRE_KIND_REQUEST, WIRE_KIND_RESPONSE, WIRE_TAG_BINARY, WIRE_TAG_TEXT,
};
use crate::encoding::Encoding;
use crate::message::{RpcErrorDescriptor, RpcMessage, RpcNotification, RpcRequest, RpcResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// Truncated or structurally invalid frame.
    MalformedMessage(String),

    /// The leading tag byte does not name the encoding the caller asked
    /// for, or names no known encoding at all. Carries the offending tag.
    UnsupportedEncoding(u8),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::MalformedMessage(reason) => write!(f, "malformed message: {reason}"),
            CodecError::UnsupportedEncoding(tag) => {
                write!(f, "unsupported encoding tag: {tag:#04x}")
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Provides encoding and decoding between [`RpcMessage`] values and wire
/// bytes for a given [`Encoding`].
///
/// The codec is stateless and performs no I/O; both directions are pure
/// functions and safe to call concurrently without coordination.
///
/// Binary frames are packed little-endian against the offsets in
/// [`crate::constants`]: a fixed `[tag][kind][request id]` header followed
/// by kind-specific fields (length-prefixed method names and payloads, a
/// status byte selecting the result or error arm of a response). Text
/// frames are JSON objects tagged by a `kind` field, with payload bytes
/// carried base64-encoded so that arbitrary body formats survive the JSON
/// envelope.
pub struct WireCodec;

impl WireCodec {
    /// Encodes a message into wire bytes.
    ///
    /// Fails with `MalformedMessage` only when a field exceeds its wire
    /// limits (e.g. a method name longer than a u16 length prefix can
    /// describe).
    pub fn encode(message: &RpcMessage, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
        match encoding {
            Encoding::Binary => encode_binary(message),
            Encoding::Text => encode_text(message),
        }
    }

    /// Decodes wire bytes produced by a peer using the same encoding.
    ///
    /// Fails with `UnsupportedEncoding` when the leading tag byte does not
    /// match the requested encoding, and with `MalformedMessage` on
    /// truncated or structurally invalid input (including trailing bytes
    /// past the end of a binary frame).
    pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<RpcMessage, CodecError> {
        let tag = *bytes
            .first()
            .ok_or_else(|| CodecError::MalformedMessage("empty frame".to_string()))?;
        match (tag, encoding) {
            (WIRE_TAG_BINARY, Encoding::Binary) => decode_binary(bytes),
            (WIRE_TAG_TEXT, Encoding::Text) => decode_text(bytes),
            (tag, _) => Err(CodecError::UnsupportedEncoding(tag)),
        }
    }
}

// --- binary arm ---

fn encode_binary(message: &RpcMessage) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(WIRE_HEADER_SIZE);
    buf.push(WIRE_TAG_BINARY);
    match message {
        RpcMessage::Request(request) => {
            buf.push(WIRE_KIND_REQUEST);
            buf.extend(&request.id.to_le_bytes());
            put_string(&mut buf, &request.method)?;
            put_payload(&mut buf, &request.payload)?;
        }
        RpcMessage::Response(response) => {
            buf.push(WIRE_KIND_RESPONSE);
            buf.extend(&response.id.to_le_bytes());
            match &response.result {
                Ok(payload) => {
                    buf.push(RESPONSE_STATUS_OK);
                    put_payload(&mut buf, payload)?;
                }
                Err(descriptor) => {
                    buf.push(RESPONSE_STATUS_ERROR);
                    buf.extend(&descriptor.code.to_le_bytes());
                    put_string(&mut buf, &descriptor.message)?;
                    match &descriptor.data {
                        Some(data) => {
                            buf.push(1);
                            put_payload(&mut buf, data)?;
                        }
                        None => buf.push(0),
                    }
                }
            }
        }
        RpcMessage::Notification(notification) => {
            buf.push(WIRE_KIND_NOTIFICATION);
            // Notifications are uncorrelated; the id slot is zeroed.
            buf.extend(&0u64.to_le_bytes());
            put_string(&mut buf, &notification.method)?;
            put_payload(&mut buf, &notification.payload)?;
        }
    }
    Ok(buf)
}

fn decode_binary(bytes: &[u8]) -> Result<RpcMessage, CodecError> {
    let mut reader = Reader::new(bytes);
    reader.skip(1)?; // encoding tag, already checked
    let kind = reader.u8()?;
    let id = reader.u64_le()?;
    let message = match kind {
        WIRE_KIND_REQUEST => {
            let method = reader.string()?;
            let payload = reader.payload()?;
            RpcMessage::Request(RpcRequest { id, method, payload })
        }
        WIRE_KIND_RESPONSE => {
            let status = reader.u8()?;
            let result = match status {
                RESPONSE_STATUS_OK => Ok(reader.payload()?),
                RESPONSE_STATUS_ERROR => {
                    let code = reader.i64_le()?;
                    let message = reader.string()?;
                    let data = match reader.u8()? {
                        0 => None,
                        1 => Some(reader.payload()?),
                        flag => {
                            return Err(CodecError::MalformedMessage(format!(
                                "invalid error data flag: {flag:#04x}"
                            )));
                        }
                    };
                    Err(RpcErrorDescriptor { code, message, data })
                }
                status => {
                    return Err(CodecError::MalformedMessage(format!(
                        "invalid response status: {status:#04x}"
                    )));
                }
            };
            RpcMessage::Response(RpcResponse { id, result })
        }
        WIRE_KIND_NOTIFICATION => {
            let method = reader.string()?;
            let payload = reader.payload()?;
            RpcMessage::Notification(RpcNotification { method, payload })
        }
        kind => {
            return Err(CodecError::MalformedMessage(format!(
                "unknown message kind: {kind:#04x}"
            )));
        }
    };
    reader.finish()?;
    Ok(message)
}

fn put_string(buf: &mut Vec<u8>, value: &str) -> Result<(), CodecError> {
    let len = u16::try_from(value.len()).map_err(|_| {
        CodecError::MalformedMessage(format!("string field of {} bytes exceeds u16 prefix", value.len()))
    })?;
    buf.extend(&len.to_le_bytes());
    buf.extend(value.as_bytes());
    Ok(())
}

fn put_payload(buf: &mut Vec<u8>, payload: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        CodecError::MalformedMessage(format!("payload of {} bytes exceeds u32 prefix", payload.len()))
    })?;
    buf.extend(&len.to_le_bytes());
    buf.extend(payload);
    Ok(())
}

/// Bounds-checked cursor over a binary frame. Every read past the end of
/// the buffer is a `MalformedMessage`, never a panic.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len()).ok_or_else(|| {
            CodecError::MalformedMessage(format!(
                "truncated frame: wanted {n} bytes at offset {}, have {}",
                self.pos,
                self.buf.len()
            ))
        })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), CodecError> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32_le(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64_le(&mut self) -> Result<u64, CodecError> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| CodecError::MalformedMessage("truncated u64 field".to_string()))?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn i64_le(&mut self) -> Result<i64, CodecError> {
        self.u64_le().map(|v| v as i64)
    }

    /// A u16 length-prefixed UTF-8 string.
    fn string(&mut self) -> Result<String, CodecError> {
        let len = self.u16_le()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CodecError::MalformedMessage("string field is not valid utf-8".to_string()))
    }

    /// A u32 length-prefixed byte payload.
    fn payload(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.u32_le()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn finish(&self) -> Result<(), CodecError> {
        if self.pos != self.buf.len() {
            return Err(CodecError::MalformedMessage(format!(
                "{} trailing bytes past end of frame",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

// --- text arm ---

/// JSON wire shape of a text frame. Payload bytes are base64-encoded so
/// the envelope stays valid JSON regardless of the body format.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TextFrame {
    Request {
        id: u64,
        method: String,
        payload: String,
    },
    Response {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<TextErrorDescriptor>,
    },
    Notification {
        method: String,
        payload: String,
    },
}

#[derive(Serialize, Deserialize)]
struct TextErrorDescriptor {
    code: i64,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

fn encode_text(message: &RpcMessage) -> Result<Vec<u8>, CodecError> {
    let frame = match message {
        RpcMessage::Request(request) => TextFrame::Request {
            id: request.id,
            method: request.method.clone(),
            payload: base64::encode(&request.payload),
        },
        RpcMessage::Response(response) => {
            let (result, error) = match &response.result {
                Ok(payload) => (Some(base64::encode(payload)), None),
                Err(descriptor) => (
                    None,
                    Some(TextErrorDescriptor {
                        code: descriptor.code,
                        message: descriptor.message.clone(),
                        data: descriptor.data.as_ref().map(base64::encode),
                    }),
                ),
            };
            TextFrame::Response { id: response.id, result, error }
        }
        RpcMessage::Notification(notification) => TextFrame::Notification {
            method: notification.method.clone(),
            payload: base64::encode(&notification.payload),
        },
    };
    serde_json::to_vec(&frame)
        .map_err(|e| CodecError::MalformedMessage(format!("text frame encode failed: {e}")))
}

fn decode_text(bytes: &[u8]) -> Result<RpcMessage, CodecError> {
    let frame: TextFrame = serde_json::from_slice(bytes)
        .map_err(|e| CodecError::MalformedMessage(format!("text frame decode failed: {e}")))?;
    let message = match frame {
        TextFrame::Request { id, method, payload } => {
            RpcMessage::Request(RpcRequest { id, method, payload: from_base64(&payload)? })
        }
        TextFrame::Response { id, result, error } => {
            let result = match (result, error) {
                (Some(payload), None) => Ok(from_base64(&payload)?),
                (None, Some(descriptor)) => Err(RpcErrorDescriptor {
                    code: descriptor.code,
                    message: descriptor.message,
                    data: descriptor.data.as_deref().map(from_base64).transpose()?,
                }),
                (None, None) => {
                    return Err(CodecError::MalformedMessage(
                        "response carries neither result nor error".to_string(),
                    ));
                }
                (Some(_), Some(_)) => {
                    return Err(CodecError::MalformedMessage(
                        "response carries both result and error".to_string(),
                    ));
                }
            };
            RpcMessage::Response(RpcResponse { id, result })
        }
        TextFrame::Notification { method, payload } => {
            RpcMessage::Notification(RpcNotification { method, payload: from_base64(&payload)? })
        }
    };
    Ok(message)
}

fn from_base64(s: &str) -> Result<Vec<u8>, CodecError> {
    base64::decode(s)
        .map_err(|e| CodecError::MalformedMessage(format!("invalid base64 payload: {e}")))
}
