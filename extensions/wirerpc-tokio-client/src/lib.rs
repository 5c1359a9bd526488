//! Tokio WebSocket client for the wirerpc protocol.
//!
//! One connection multiplexes any number of concurrent requests, matched
//! back to their callers by correlation id. The endpoint comes either
//! from a pinned URL or from a `wirerpc-resolver` [`Resolver`], and an
//! optional [`ReconnectPolicy`] re-establishes the transport after an
//! unexpected loss.
//!
//! [`Resolver`]: wirerpc_resolver::Resolver

pub mod config;
pub mod error;
pub mod rpc_client;
pub mod state;

pub use config::{DEFAULT_REQUEST_TIMEOUT, ReconnectPolicy, RpcClientConfig};
pub use error::RpcClientError;
pub use rpc_client::RpcClient;
pub use state::ConnectionState;
