use crate::discovery::{DiscoveryError, DiscoverySource, NodeDescriptor};
use crate::selection::{LatencyCapacityPolicy, SelectionPolicy};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wirerpc::{Encoding, NetworkId};

/// Bounded exponential backoff for transient discovery failures.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(250) }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `failed_attempts` failures:
    /// `base * 2^failed_attempts`, zero-indexed from the first failure.
    fn delay_after(&self, failed_attempts: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << failed_attempts.min(16))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResolverOptions {
    pub retry: RetryPolicy,
    /// How long a successful resolution stays reusable without
    /// re-querying discovery.
    pub cache_ttl: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { retry: RetryPolicy::default(), cache_ttl: Duration::from_secs(60) }
    }
}

/// A validated, encoding-tagged URL for an RPC node. Produced by
/// [`Resolver::resolve_url`], consumed by the client. Immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    /// The encoding this endpoint was resolved for.
    pub encoding: Encoding,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.encoding)
    }
}

#[derive(Debug)]
pub enum ResolveError {
    /// Discovery answered, but nothing matched the requested network and
    /// encoding (or every match had an unusable URL).
    NoEligibleEndpoint { encoding: Encoding, network_id: NetworkId },

    /// Discovery stayed unreachable after exhausting the retry budget, or
    /// failed fatally.
    ResolverUnavailable { attempts: u32, last_error: DiscoveryError },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NoEligibleEndpoint { encoding, network_id } => {
                write!(f, "no eligible endpoint for {encoding} on {network_id}")
            }
            ResolveError::ResolverUnavailable { attempts, last_error } => {
                write!(f, "discovery unavailable after {attempts} attempt(s): {last_error}")
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::ResolverUnavailable { last_error, .. } => Some(last_error),
            ResolveError::NoEligibleEndpoint { .. } => None,
        }
    }
}

struct CacheEntry {
    endpoint: Endpoint,
    resolved_at: Instant,
}

/// Maps `(Encoding, NetworkId)` to a reachable endpoint.
///
/// Cheap to clone; all clones share the same discovery source, selection
/// policy and cache. Resolution calls are independent and may run fully
/// in parallel across clients — the cache is the only shared mutable
/// state, and its updates are last-writer-wins under a mutex.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

struct Inner {
    discovery: Arc<dyn DiscoverySource>,
    selection: Box<dyn SelectionPolicy>,
    options: ResolverOptions,
    cache: Mutex<HashMap<(Encoding, NetworkId), CacheEntry>>,
}

impl Resolver {
    pub fn new(discovery: Arc<dyn DiscoverySource>) -> Self {
        Self::with_options(discovery, ResolverOptions::default())
    }

    pub fn with_options(discovery: Arc<dyn DiscoverySource>, options: ResolverOptions) -> Self {
        Self::with_selection(discovery, Box::new(LatencyCapacityPolicy), options)
    }

    pub fn with_selection(
        discovery: Arc<dyn DiscoverySource>,
        selection: Box<dyn SelectionPolicy>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                discovery,
                selection,
                options,
                cache: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolves a live endpoint advertising the requested network and
    /// encoding.
    ///
    /// Serves from the cache while the TTL holds; otherwise queries
    /// discovery (retrying transient failures per the configured
    /// [`RetryPolicy`]), filters candidates, and applies the selection
    /// policy.
    pub async fn resolve_url(
        &self,
        encoding: Encoding,
        network_id: NetworkId,
    ) -> Result<Endpoint, ResolveError> {
        if let Some(endpoint) = self.cached(encoding, network_id) {
            tracing::debug!(%endpoint, "resolved from cache");
            return Ok(endpoint);
        }

        let descriptors = self.query_with_retry(network_id).await?;
        let candidates: Vec<NodeDescriptor> = descriptors
            .into_iter()
            .filter(|d| d.supports(encoding, network_id) && is_websocket_url(&d.url))
            .collect();
        if candidates.is_empty() {
            tracing::warn!(%encoding, %network_id, "discovery returned no eligible candidates");
            return Err(ResolveError::NoEligibleEndpoint { encoding, network_id });
        }

        let chosen = self
            .inner
            .selection
            .select(candidates)
            .ok_or(ResolveError::NoEligibleEndpoint { encoding, network_id })?;
        let endpoint = Endpoint { url: chosen.url, encoding };
        tracing::debug!(%endpoint, %network_id, "resolved endpoint");
        self.store(encoding, network_id, endpoint.clone());
        Ok(endpoint)
    }

    /// Drops the cached resolution for a pair, forcing the next
    /// `resolve_url` to re-query discovery. Called by clients after a
    /// failed connect to a cached endpoint.
    pub fn evict(&self, encoding: Encoding, network_id: NetworkId) {
        self.inner.cache.lock().unwrap().remove(&(encoding, network_id));
    }

    async fn query_with_retry(
        &self,
        network_id: NetworkId,
    ) -> Result<Vec<NodeDescriptor>, ResolveError> {
        let retry = self.inner.options.retry;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.inner.discovery.query(network_id).await {
                Ok(descriptors) => return Ok(descriptors),
                Err(error @ DiscoveryError::Fatal(_)) => {
                    return Err(ResolveError::ResolverUnavailable { attempts, last_error: error });
                }
                Err(error @ DiscoveryError::Transient(_)) => {
                    if attempts >= retry.max_attempts {
                        tracing::warn!(attempts, %error, "discovery retry budget exhausted");
                        return Err(ResolveError::ResolverUnavailable {
                            attempts,
                            last_error: error,
                        });
                    }
                    let delay = retry.delay_after(attempts - 1);
                    tracing::debug!(attempts, ?delay, %error, "discovery query failed, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn cached(&self, encoding: Encoding, network_id: NetworkId) -> Option<Endpoint> {
        let mut cache = self.inner.cache.lock().unwrap();
        match cache.get(&(encoding, network_id)) {
            Some(entry) if entry.resolved_at.elapsed() < self.inner.options.cache_ttl => {
                Some(entry.endpoint.clone())
            }
            Some(_) => {
                cache.remove(&(encoding, network_id));
                None
            }
            None => None,
        }
    }

    fn store(&self, encoding: Encoding, network_id: NetworkId, endpoint: Endpoint) {
        self.inner.cache.lock().unwrap().insert(
            (encoding, network_id),
            CacheEntry { endpoint, resolved_at: Instant::now() },
        );
    }
}

/// Candidate URLs must be WebSocket URLs with a host component.
fn is_websocket_url(url: &str) -> bool {
    url.strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .is_some_and(|rest| !rest.is_empty())
}
