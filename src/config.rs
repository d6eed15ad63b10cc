//! Configuration types for the affinity client.

use crate::error::{Error, Result};
use crate::types::Endpoint;
use std::time::Duration;

/// Default maximum size of a single response frame.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Main configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Seed endpoints. Used for metadata requests and for keys whose
    /// partition has no known owner.
    pub endpoints: Vec<Endpoint>,

    /// Timeout for establishing a connection to one endpoint.
    pub connect_timeout: Duration,

    /// Timeout for one request/response exchange with one endpoint.
    pub request_timeout: Duration,

    /// Maximum accepted response size in bytes.
    pub max_message_size: usize,

    /// Route keyed requests to partition owners. When off, every request is
    /// sent to the seed endpoints and the partition map is never fetched.
    pub affinity_awareness: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            affinity_awareness: true,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with the given seed endpoints.
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    /// Create a configuration from `host:port` strings.
    pub fn from_addrs<S: AsRef<str>>(addrs: &[S]) -> Result<Self> {
        let endpoints = addrs
            .iter()
            .map(|addr| addr.as_ref().parse())
            .collect::<Result<Vec<Endpoint>>>()?;
        Ok(Self::new(endpoints))
    }

    /// Add a seed endpoint.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Set connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set maximum response size.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Enable or disable affinity routing.
    pub fn with_affinity_awareness(mut self, enabled: bool) -> Self {
        self.affinity_awareness = enabled;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::Config("at least one endpoint is required".to_string()));
        }
        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        if self.max_message_size == 0 {
            return Err(Error::Config("max_message_size must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(config.affinity_awareness);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::from_addrs(&["127.0.0.1:10800", "127.0.0.1:10801"])
            .unwrap()
            .with_endpoint(Endpoint::new("node3", 10800))
            .with_connect_timeout(Duration::from_millis(250))
            .with_request_timeout(Duration::from_secs(1))
            .with_max_message_size(1024)
            .with_affinity_awareness(false);

        assert_eq!(config.endpoints.len(), 3);
        assert_eq!(config.endpoints[2].host, "node3");
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(1));
        assert_eq!(config.max_message_size, 1024);
        assert!(!config.affinity_awareness);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        assert!(ClientConfig::from_addrs(&["no-port"]).is_err());

        let config = ClientConfig::new(vec![Endpoint::new("a", 1)])
            .with_request_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
