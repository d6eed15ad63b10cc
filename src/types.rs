//! Core types used throughout the affinity client.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cache identifier as understood by the cluster.
pub type CacheId = i32;

/// Partition identifier.
pub type PartitionId = i32;

/// Address of a reachable cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Config(format!("endpoint '{}' is missing a port", s)))?;

        if host.is_empty() {
            return Err(Error::Config(format!("endpoint '{}' is missing a host", s)));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("invalid port in endpoint '{}': {}", s, e)))?;

        Ok(Self::new(host, port))
    }
}

/// Identifies the logical cache that operations target.
///
/// Created once and immutable for the lifetime of the client that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHandle {
    name: String,
    id: CacheId,
    binary: bool,
}

impl CacheHandle {
    /// Create a handle with an explicit cache id.
    pub fn new(name: impl Into<String>, id: CacheId) -> Self {
        Self {
            name: name.into(),
            id,
            binary: false,
        }
    }

    /// Create a handle whose id is derived from the cache name the same way
    /// the cluster derives it.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = cache_id_for_name(&name);
        Self::new(name, id)
    }

    /// Set keep-binary mode.
    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache id.
    pub fn id(&self) -> CacheId {
        self.id
    }

    /// Whether values are kept in binary form on the server.
    pub fn is_binary(&self) -> bool {
        self.binary
    }
}

impl fmt::Display for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

/// Derive the cluster cache id from a cache name.
///
/// Java `String.hashCode` over UTF-16 code units. Zero is reserved, so a name
/// hashing to zero maps to 1, as does the empty name.
pub fn cache_id_for_name(name: &str) -> CacheId {
    let hash = name
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));

    if hash == 0 {
        1
    } else {
        hash
    }
}
