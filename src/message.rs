/// An outbound call addressed by its correlation id.
///
/// The payload is an opaque, already-serialized body; its format is the
/// body format of the connection's [`crate::Encoding`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcRequest {
    /// Unique per-connection correlation id.
    pub id: u64,
    pub method: String,
    pub payload: Vec<u8>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { id, method: method.into(), payload }
    }
}

/// Application-level error carried inside a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcErrorDescriptor {
    pub code: i64,
    pub message: String,
    pub data: Option<Vec<u8>>,
}

/// A correlated reply: either a result payload or an error descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcResponse {
    /// Matches the id of the request being answered.
    pub id: u64,
    pub result: Result<Vec<u8>, RpcErrorDescriptor>,
}

impl RpcResponse {
    pub fn ok(id: u64, payload: Vec<u8>) -> Self {
        Self { id, result: Ok(payload) }
    }

    pub fn error(id: u64, descriptor: RpcErrorDescriptor) -> Self {
        Self { id, result: Err(descriptor) }
    }
}

/// A server-initiated message with no correlation id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcNotification {
    pub method: String,
    pub payload: Vec<u8>,
}

/// Everything that can travel over a connection, in either direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RpcMessage {
    Request(RpcRequest),
    Response(RpcResponse),
    Notification(RpcNotification),
}

impl RpcMessage {
    /// The correlation id, for the message kinds that carry one.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            RpcMessage::Request(request) => Some(request.id),
            RpcMessage::Response(response) => Some(response.id),
            RpcMessage::Notification(_) => None,
        }
    }
}
