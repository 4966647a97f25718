//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Which load balancer this process manages.
    pub manager: ManagerSection,

    /// Base template and generated section settings.
    pub haproxy: HaproxyConfig,

    /// HAProxy Data Plane API connection and readiness budget.
    pub dataplane: DataPlaneConfig,

    /// Load balancer API (desired state) connection.
    pub lbapi: LbApiConfig,

    /// Event gateway connection and topics.
    pub events: EventsConfig,

    /// Logging, metrics and status endpoint.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ManagerSection {
    /// Prefixed id of the managed load balancer (e.g. "loadbal-abc123").
    pub loadbalancer_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HaproxyConfig {
    /// Path to the base configuration template.
    pub base_config_path: PathBuf,

    /// Address family used in generated `bind` lines.
    pub address_family: String,
}

impl Default for HaproxyConfig {
    fn default() -> Self {
        Self {
            base_config_path: PathBuf::from("/usr/local/etc/haproxy/haproxy.cfg"),
            address_family: crate::haproxy::DEFAULT_ADDRESS_FAMILY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DataPlaneConfig {
    /// Data Plane API base URL, including the API version path.
    pub url: String,

    pub username: String,

    pub password: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Readiness probes before giving up at startup.
    pub retry_limit: u32,

    /// Delay between readiness probes in milliseconds.
    pub retry_interval_ms: u64,
}

impl DataPlaneConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for DataPlaneConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5555/v2/".to_string(),
            username: "haproxy".to_string(),
            password: String::new(),
            timeout_secs: 10,
            retry_limit: 10,
            retry_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LbApiConfig {
    /// GraphQL endpoint of the load balancer API.
    pub url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Client-credentials settings; requests are unauthenticated when absent.
    pub oauth: Option<OAuthConfig>,
}

impl LbApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LbApiConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7608/query".to_string(),
            timeout_secs: 10,
            oauth: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Event gateway WebSocket URL.
    pub url: String,

    /// Prepended to every topic.
    pub subject_prefix: String,

    /// Topics (or wildcard patterns) to subscribe to.
    pub topics: Vec<String>,
}

impl EventsConfig {
    /// Topics with the subject prefix applied.
    pub fn prefixed_topics(&self) -> Vec<String> {
        self.topics
            .iter()
            .map(|t| crate::events::topic::prefixed(&self.subject_prefix, t))
            .collect()
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:4223/events".to_string(),
            subject_prefix: "com.infratographer".to_string(),
            topics: vec!["changes.*.load-balancer".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Enable the read-only status endpoint.
    pub status_enabled: bool,

    pub status_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            status_enabled: false,
            status_address: "127.0.0.1:8081".to_string(),
        }
    }
}
