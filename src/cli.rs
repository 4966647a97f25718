//! Command-line interface.
//!
//! Flags (and their environment variables) override values from the
//! configuration file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{LogFormat, ManagerConfig};

/// HAProxy load balancer manager
#[derive(Parser, Debug, Default)]
#[command(name = "haproxy-lb-manager", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "LBMANAGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Id of the load balancer this process manages
    #[arg(long, env = "LBMANAGER_LOADBALANCER_ID")]
    pub loadbalancer_id: Option<String>,

    /// Base HAProxy configuration template
    #[arg(long, env = "LBMANAGER_HAPROXY_BASE_CONFIG")]
    pub base_config: Option<PathBuf>,

    /// Address family for generated bind lines
    #[arg(long, env = "LBMANAGER_HAPROXY_ADDRESS_FAMILY")]
    pub address_family: Option<String>,

    /// Data Plane API base URL
    #[arg(long, env = "LBMANAGER_DATAPLANE_URL")]
    pub dataplane_url: Option<String>,

    #[arg(long, env = "LBMANAGER_DATAPLANE_USERNAME")]
    pub dataplane_username: Option<String>,

    #[arg(long, env = "LBMANAGER_DATAPLANE_PASSWORD", hide_env_values = true)]
    pub dataplane_password: Option<String>,

    /// Readiness probes before giving up
    #[arg(long, env = "LBMANAGER_DATAPLANE_RETRY_LIMIT")]
    pub dataplane_retry_limit: Option<u32>,

    /// Delay between readiness probes, in milliseconds
    #[arg(long, env = "LBMANAGER_DATAPLANE_RETRY_INTERVAL_MS")]
    pub dataplane_retry_interval_ms: Option<u64>,

    /// Load balancer API GraphQL endpoint
    #[arg(long, env = "LBMANAGER_LBAPI_URL")]
    pub lbapi_url: Option<String>,

    /// Event gateway WebSocket URL
    #[arg(long, env = "LBMANAGER_EVENTS_URL")]
    pub events_url: Option<String>,

    /// Prefix applied to every topic
    #[arg(long, env = "LBMANAGER_EVENTS_SUBJECT_PREFIX")]
    pub subject_prefix: Option<String>,

    /// Topic to subscribe to (repeatable; replaces configured topics)
    #[arg(long = "topic", env = "LBMANAGER_EVENTS_TOPICS", value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LBMANAGER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    pub json_logs: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "LBMANAGER_METRICS_ADDRESS")]
    pub metrics_address: Option<String>,

    /// Serve the status endpoint on this address
    #[arg(long, env = "LBMANAGER_STATUS_ADDRESS")]
    pub status_address: Option<String>,
}

impl Cli {
    /// Apply flag values over `config`.
    pub fn apply(&self, config: &mut ManagerConfig) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut config.manager.loadbalancer_id, &self.loadbalancer_id);
        set(&mut config.haproxy.base_config_path, &self.base_config);
        set(&mut config.haproxy.address_family, &self.address_family);
        set(&mut config.dataplane.url, &self.dataplane_url);
        set(&mut config.dataplane.username, &self.dataplane_username);
        set(&mut config.dataplane.password, &self.dataplane_password);
        set(&mut config.dataplane.retry_limit, &self.dataplane_retry_limit);
        set(
            &mut config.dataplane.retry_interval_ms,
            &self.dataplane_retry_interval_ms,
        );
        set(&mut config.lbapi.url, &self.lbapi_url);
        set(&mut config.events.url, &self.events_url);
        set(&mut config.events.subject_prefix, &self.subject_prefix);
        if !self.topics.is_empty() {
            config.events.topics = self.topics.clone();
        }

        set(&mut config.observability.log_level, &self.log_level);
        if self.json_logs {
            config.observability.log_format = LogFormat::Json;
        }
        if let Some(addr) = &self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr.clone();
        }
        if let Some(addr) = &self.status_address {
            config.observability.status_enabled = true;
            config.observability.status_address = addr.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "haproxy-lb-manager",
            "--loadbalancer-id",
            "loadbal-cli",
            "--address-family",
            "ipv6",
            "--topic",
            "changes.*.load-balancer,changes.*.load-balancer-pool",
            "--json-logs",
            "--status-address",
            "127.0.0.1:9000",
        ])
        .unwrap();

        let mut config = ManagerConfig::default();
        config.dataplane.username = "from-file".into();
        cli.apply(&mut config);

        assert_eq!(config.manager.loadbalancer_id, "loadbal-cli");
        assert_eq!(config.haproxy.address_family, "ipv6");
        assert_eq!(config.events.topics.len(), 2);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(config.observability.status_enabled);
        assert!(!config.observability.metrics_enabled);
        assert_eq!(config.dataplane.username, "from-file");
    }

    #[test]
    fn test_no_flags_keeps_config() {
        let mut config = ManagerConfig::default();
        config.manager.loadbalancer_id = "loadbal-file".into();
        Cli::default().apply(&mut config);
        assert_eq!(config.manager.loadbalancer_id, "loadbal-file");
        assert_eq!(config, {
            let mut expected = ManagerConfig::default();
            expected.manager.loadbalancer_id = "loadbal-file".into();
            expected
        });
    }
}
