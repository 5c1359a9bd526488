use std::fmt;
use std::str::FromStr;

/// The logical network a node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Devnet,
    Simnet,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
            NetworkType::Devnet => "devnet",
            NetworkType::Simnet => "simnet",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = NetworkIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(NetworkType::Mainnet),
            "testnet" => Ok(NetworkType::Testnet),
            "devnet" => Ok(NetworkType::Devnet),
            "simnet" => Ok(NetworkType::Simnet),
            other => Err(NetworkIdError::InvalidNetworkType(other.to_string())),
        }
    }
}

/// Opaque identifier selecting a logical network, e.g. `mainnet` or
/// `testnet-10`.
///
/// Only testnets carry a numeric suffix (multiple test networks can run
/// side by side). Validated at construction; an invalid combination never
/// produces a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NetworkId {
    network_type: NetworkType,
    suffix: Option<u32>,
}

impl NetworkId {
    pub fn new(network_type: NetworkType) -> Self {
        Self { network_type, suffix: None }
    }

    /// Creates a suffixed network id. Fails unless the network type is one
    /// that supports suffixes (currently only `Testnet`).
    pub fn with_suffix(network_type: NetworkType, suffix: u32) -> Result<Self, NetworkIdError> {
        match network_type {
            NetworkType::Testnet => Ok(Self { network_type, suffix: Some(suffix) }),
            other => Err(NetworkIdError::UnexpectedSuffix(other, suffix)),
        }
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    pub fn suffix(&self) -> Option<u32> {
        self.suffix
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            Some(suffix) => write!(f, "{}-{}", self.network_type, suffix),
            None => write!(f, "{}", self.network_type),
        }
    }
}

impl FromStr for NetworkId {
    type Err = NetworkIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            None => Ok(NetworkId::new(s.parse()?)),
            Some((network_type, suffix)) => {
                let network_type: NetworkType = network_type.parse()?;
                let suffix = suffix
                    .parse::<u32>()
                    .map_err(|_| NetworkIdError::InvalidSuffix(s.to_string()))?;
                NetworkId::with_suffix(network_type, suffix)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkIdError {
    /// The network type is not part of the fixed enumeration.
    InvalidNetworkType(String),
    /// The suffix is present but not a valid number.
    InvalidSuffix(String),
    /// The network type does not admit a suffix.
    UnexpectedSuffix(NetworkType, u32),
}

impl fmt::Display for NetworkIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkIdError::InvalidNetworkType(s) => {
                write!(f, "invalid network type: {s:?}")
            }
            NetworkIdError::InvalidSuffix(s) => {
                write!(f, "invalid network suffix in {s:?}")
            }
            NetworkIdError::UnexpectedSuffix(network_type, suffix) => {
                write!(f, "network type {network_type} does not take a suffix (got {suffix})")
            }
        }
    }
}

impl std::error::Error for NetworkIdError {}
