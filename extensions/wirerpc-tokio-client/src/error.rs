use std::error::Error;
use std::fmt;
use std::time::Duration;
use wirerpc::{CodecError, RpcErrorDescriptor};

#[derive(Debug)]
pub enum RpcClientError {
    /// The client configuration cannot produce a usable connection.
    InvalidConfiguration(String),

    /// Establishing the transport failed. `url` is absent when the
    /// failure happened before an endpoint was resolved.
    ConnectFailed {
        url: Option<String>,
        reason: String,
        source: Option<Box<dyn Error + Send + Sync>>,
    },

    /// A request was issued while the client had no live transport.
    NotConnected,

    /// No response arrived within the deadline. The request may still
    /// execute on the server; only the local wait was abandoned.
    RequestTimeout {
        method: String,
        request_id: u64,
        timeout: Duration,
    },

    /// The transport dropped while the request was in flight.
    ConnectionClosed,

    /// The server answered with an application-level error.
    Rpc(RpcErrorDescriptor),

    /// A frame could not be encoded or decoded.
    Codec(CodecError),
}

impl fmt::Display for RpcClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcClientError::InvalidConfiguration(reason) => {
                write!(f, "invalid client configuration: {reason}")
            }
            RpcClientError::ConnectFailed { url: Some(url), reason, .. } => {
                write!(f, "failed to connect to {url}: {reason}")
            }
            RpcClientError::ConnectFailed { url: None, reason, .. } => {
                write!(f, "failed to connect: {reason}")
            }
            RpcClientError::NotConnected => write!(f, "client is not connected"),
            RpcClientError::RequestTimeout { method, request_id, timeout } => write!(
                f,
                "request {request_id} ({method}) timed out after {timeout:?}"
            ),
            RpcClientError::ConnectionClosed => {
                write!(f, "connection closed while request was in flight")
            }
            RpcClientError::Rpc(descriptor) => {
                write!(f, "rpc error {}: {}", descriptor.code, descriptor.message)
            }
            RpcClientError::Codec(error) => write!(f, "codec error: {error}"),
        }
    }
}

impl Error for RpcClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RpcClientError::ConnectFailed { source, .. } => {
                source.as_ref().map(|boxed| boxed.as_ref() as &(dyn Error + 'static))
            }
            RpcClientError::Codec(error) => Some(error),
            _ => None,
        }
    }
}

impl From<CodecError> for RpcClientError {
    fn from(error: CodecError) -> Self {
        RpcClientError::Codec(error)
    }
}
