use crate::error::RpcClientError;
use std::time::Duration;
use wirerpc::{Encoding, NetworkId};
use wirerpc_resolver::Resolver;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Automatic reconnection after an unexpected transport loss. Explicit
/// `disconnect` calls never trigger it.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap on the exponential backoff between attempts.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay)
    }
}

/// Connection settings for an [`RpcClient`](crate::RpcClient).
///
/// Exactly one of `url` and `resolver` supplies the endpoint: a fixed URL
/// pins the client to one node, a resolver lets it pick (and re-pick, on
/// reconnect) a live one.
#[derive(Clone)]
pub struct RpcClientConfig {
    pub url: Option<String>,
    pub resolver: Option<Resolver>,
    pub encoding: Encoding,
    pub network_id: NetworkId,
    pub request_timeout: Duration,
    pub reconnect: Option<ReconnectPolicy>,
}

impl RpcClientConfig {
    pub fn with_url(url: impl Into<String>, encoding: Encoding, network_id: NetworkId) -> Self {
        Self {
            url: Some(url.into()),
            resolver: None,
            encoding,
            network_id,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: None,
        }
    }

    pub fn with_resolver(resolver: Resolver, encoding: Encoding, network_id: NetworkId) -> Self {
        Self {
            url: None,
            resolver: Some(resolver),
            encoding,
            network_id,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), RpcClientError> {
        match (&self.url, &self.resolver) {
            (None, None) => Err(RpcClientError::InvalidConfiguration(
                "either a url or a resolver is required".into(),
            )),
            (Some(_), Some(_)) => Err(RpcClientError::InvalidConfiguration(
                "url and resolver are mutually exclusive".into(),
            )),
            (Some(url), None) if !url.starts_with("ws://") && !url.starts_with("wss://") => {
                Err(RpcClientError::InvalidConfiguration(format!(
                    "url must use the ws:// or wss:// scheme, got {url}"
                )))
            }
            _ => Ok(()),
        }
    }
}
