//! Maps `(Encoding, NetworkId)` to a reachable RPC endpoint.
//!
//! Discovery itself is an external collaborator behind the
//! [`DiscoverySource`] trait; this crate layers candidate filtering, a
//! pluggable selection policy, bounded retry with exponential backoff,
//! and a short-TTL resolution cache on top of it.

pub mod discovery;
pub mod resolver;
pub mod selection;

pub use discovery::{DiscoveryError, DiscoverySource, NodeDescriptor, StaticDiscovery};
pub use resolver::{Endpoint, ResolveError, Resolver, ResolverOptions, RetryPolicy};
pub use selection::{LatencyCapacityPolicy, SelectionPolicy};
