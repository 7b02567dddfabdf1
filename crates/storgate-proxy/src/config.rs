//! Proxy configuration

use serde::{Deserialize, Serialize};

/// Lock name used when appending to the shared export index.
pub const EXPORT_APPEND_LOCK: &str = "export_append_lock";
/// Lock cookie paired with [`EXPORT_APPEND_LOCK`].
pub const EXPORT_APPEND_COOKIE: &str = "export_append_cookie";
/// Human-readable description recorded with the lock.
pub const EXPORT_APPEND_DESC: &str = "export_append";

/// Runtime configuration for the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Region stamped into outgoing events
    pub region: String,
    /// Upstream gateway host the proxy forwards to
    pub upstream_host: String,
    /// Object-store pool holding export definitions and the index
    pub export_pool: String,
    /// Name of the shared export index object
    pub export_index: String,
}

impl ProxyConfig {
    /// Builds a config with defaults, honoring the `TARGET_HOST`
    /// environment variable for the upstream host.
    pub fn from_env() -> Self {
        let upstream_host =
            std::env::var("TARGET_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        Self {
            region: "us-east-1".to_string(),
            upstream_host,
            export_pool: "nfs-ganesha".to_string(),
            export_index: "export".to_string(),
        }
    }

    /// Overrides the region.
    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            upstream_host: "127.0.0.1".to_string(),
            export_pool: "nfs-ganesha".to_string(),
            export_index: "export".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_region() {
        let config = ProxyConfig::default();
        assert_eq!(config.region, "us-east-1");
    }

    #[test]
    fn test_default_config_export_pool_and_index() {
        let config = ProxyConfig::default();
        assert_eq!(config.export_pool, "nfs-ganesha");
        assert_eq!(config.export_index, "export");
    }

    #[test]
    fn test_with_region_overrides() {
        let config = ProxyConfig::default().with_region("ap-east-1");
        assert_eq!(config.region, "ap-east-1");
    }
}
