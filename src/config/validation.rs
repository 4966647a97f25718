//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. All errors are returned,
//! not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ManagerConfig;
use crate::events::topic;
use crate::haproxy::types::BIND_ADDRESS_FAMILIES;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("manager.loadbalancer_id must be set")]
    MissingLoadBalancerId,

    #[error("haproxy.base_config_path must be set")]
    MissingBaseConfigPath,

    #[error("haproxy.address_family {0:?} is not a supported bind address family")]
    InvalidAddressFamily(String),

    #[error("{field} is not a valid URL: {value:?}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("events.topics must contain at least one topic")]
    NoTopics,

    #[error("invalid event topic {0:?}")]
    InvalidTopic(String),

    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.manager.loadbalancer_id.trim().is_empty() {
        errors.push(ValidationError::MissingLoadBalancerId);
    }

    if config.haproxy.base_config_path.as_os_str().is_empty() {
        errors.push(ValidationError::MissingBaseConfigPath);
    }
    if !BIND_ADDRESS_FAMILIES.contains(&config.haproxy.address_family.as_str()) {
        errors.push(ValidationError::InvalidAddressFamily(
            config.haproxy.address_family.clone(),
        ));
    }

    check_url(&mut errors, "dataplane.url", &config.dataplane.url);
    check_url(&mut errors, "lbapi.url", &config.lbapi.url);
    check_url(&mut errors, "events.url", &config.events.url);
    if let Some(oauth) = &config.lbapi.oauth {
        check_url(&mut errors, "lbapi.oauth.token_url", &oauth.token_url);
    }

    if config.dataplane.timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "dataplane.timeout_secs",
        });
    }
    if config.dataplane.retry_limit == 0 {
        errors.push(ValidationError::Zero {
            field: "dataplane.retry_limit",
        });
    }
    if config.lbapi.timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "lbapi.timeout_secs",
        });
    }

    if config.events.topics.is_empty() {
        errors.push(ValidationError::NoTopics);
    }
    for full in config.events.prefixed_topics() {
        if topic::validate(&full).is_err() {
            errors.push(ValidationError::InvalidTopic(full));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &obs.metrics_address);
    }
    if obs.status_enabled {
        check_addr(&mut errors, "observability.status_address", &obs.status_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
