//! Runtime-agnostic core of the wirerpc toolkit.
//!
//! This crate defines the pieces of the RPC protocol that do not depend on
//! any async runtime or transport: network identifiers, wire encodings, the
//! request/response/notification message model, and the stateless
//! [`WireCodec`] that maps messages to and from wire bytes.
//!
//! Transport-specific layers (the tokio WebSocket client, the endpoint
//! resolver, payload encryption) live in the `extensions/` crates and build
//! on top of these types.

pub mod codec;
pub mod constants;
pub mod encoding;
pub mod message;
pub mod network;

pub use codec::{CodecError, WireCodec};
pub use encoding::Encoding;
pub use message::{RpcErrorDescriptor, RpcMessage, RpcNotification, RpcRequest, RpcResponse};
pub use network::{NetworkId, NetworkIdError, NetworkType};
