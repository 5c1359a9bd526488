use async_trait::async_trait;
use std::fmt;
use wirerpc::{Encoding, NetworkId};

/// A node advertisement returned by a discovery source.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDescriptor {
    pub url: String,
    /// Wire encodings the node accepts.
    pub encodings: Vec<Encoding>,
    pub network_id: NetworkId,
    /// Observed round-trip latency, when the source measures it.
    pub latency_ms: Option<u64>,
    /// Advertised spare capacity in `[0, 1]`, when the source reports it.
    pub capacity: Option<f64>,
}

impl NodeDescriptor {
    pub fn new(url: impl Into<String>, encodings: Vec<Encoding>, network_id: NetworkId) -> Self {
        Self { url: url.into(), encodings, network_id, latency_ms: None, capacity: None }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn supports(&self, encoding: Encoding, network_id: NetworkId) -> bool {
        self.network_id == network_id && self.encodings.contains(&encoding)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Worth retrying: the source was unreachable or overloaded.
    Transient(String),

    /// Not worth retrying: the source rejected the query outright.
    Fatal(String),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::Transient(reason) => write!(f, "transient discovery failure: {reason}"),
            DiscoveryError::Fatal(reason) => write!(f, "discovery failure: {reason}"),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// The external service that knows which nodes exist.
///
/// Implementations must be safe to query concurrently; the resolver never
/// serializes calls to the same source.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Returns every known node descriptor advertising the given network.
    async fn query(&self, network_id: NetworkId) -> Result<Vec<NodeDescriptor>, DiscoveryError>;
}

/// Discovery backed by a fixed seed list. Used for bootstrap
/// configurations and as the stub source in tests.
pub struct StaticDiscovery {
    descriptors: Vec<NodeDescriptor>,
}

impl StaticDiscovery {
    pub fn new(descriptors: Vec<NodeDescriptor>) -> Self {
        Self { descriptors }
    }
}

#[async_trait]
impl DiscoverySource for StaticDiscovery {
    async fn query(&self, network_id: NetworkId) -> Result<Vec<NodeDescriptor>, DiscoveryError> {
        Ok(self
            .descriptors
            .iter()
            .filter(|descriptor| descriptor.network_id == network_id)
            .cloned()
            .collect())
    }
}
