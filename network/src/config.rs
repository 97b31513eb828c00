use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address, `host:port`.
    pub server: String,
    /// Local address the client socket is bound to.
    pub bind: String,
    /// Attempts per request, including the first one.
    pub retries: u32,
    pub timeout_ms: u64,
    /// How long a cached range may be served without asking the server.
    pub freshness_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:45600".to_string(),
            bind: "127.0.0.1:45601".to_string(),
            retries: 3,
            timeout_ms: 1000,
            freshness_ms: 5000,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retries == 0 {
            return Err(ClientError::InvalidConfig(
                "retries must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves `host:port` to the first IPv4 address it names.
pub async fn resolve(address: &str) -> Result<SocketAddr> {
    lookup_host(address)
        .await
        .map_err(|e| ClientError::Resolve(format!("DNS lookup for {address} failed: {e:?}")))?
        .find(|addr| addr.is_ipv4())
        .ok_or_else(|| ClientError::Resolve(format!("{address:?} has no IPv4 address")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.freshness(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_retries_is_rejected() {
        let config = ClientConfig {
            retries: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ClientError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_resolve_ipv4_literal() {
        let addr = resolve("127.0.0.1:45600").await.unwrap();
        assert_eq!(addr, "127.0.0.1:45600".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_resolve_rejects_missing_port() {
        assert!(matches!(
            resolve("127.0.0.1").await,
            Err(ClientError::Resolve(_))
        ));
    }
}
