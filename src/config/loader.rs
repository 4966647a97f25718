//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ManagerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{}", format_validation(.0))]
    Validation(Vec<ValidationError>),
}

fn format_validation(errors: &[ValidationError]) -> String {
    let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!("validation failed: {}", joined.join(", "))
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<ManagerConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Read a TOML file. Validation runs after CLI overrides are applied.
pub fn load_config(path: &Path) -> Result<ManagerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Read and validate a TOML file.
pub fn load_and_validate(path: &Path) -> Result<ManagerConfig, ConfigError> {
    let config = load_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[manager]
loadbalancer_id = "loadbal-abc"

[haproxy]
base_config_path = "/etc/haproxy/base.cfg"
address_family = "ipv6"

[dataplane]
url = "http://127.0.0.1:5555/v2/"
username = "haproxy"
password = "adminpwd"
retry_limit = 3
retry_interval_ms = 250

[lbapi]
url = "http://lbapi:7608/query"

[lbapi.oauth]
client_id = "lbmanager"
client_secret = "s3cret"
token_url = "http://identity/oauth/token"

[events]
url = "ws://gateway:4223/events"
topics = ["changes.*.load-balancer", "changes.*.load-balancer-pool"]

[observability]
log_format = "json"
"#
        )
        .unwrap();

        let config = load_and_validate(file.path()).unwrap();
        assert_eq!(config.manager.loadbalancer_id, "loadbal-abc");
        assert_eq!(config.haproxy.address_family, "ipv6");
        assert_eq!(config.dataplane.retry_limit, 3);
        assert_eq!(config.dataplane.timeout_secs, 10);
        assert_eq!(config.lbapi.oauth.unwrap().client_id, "lbmanager");
        assert_eq!(config.events.subject_prefix, "com.infratographer");
        assert_eq!(config.events.topics.len(), 2);
        assert_eq!(
            config.observability.log_format,
            crate::config::LogFormat::Json
        );
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/lbmanager.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[manager\nloadbalancer_id = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[dataplane]\nretry_limit = 0\n").unwrap();

        let err = load_and_validate(file.path()).unwrap_err();
        let ConfigError::Validation(errors) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.contains(&ValidationError::MissingLoadBalancerId));
        assert!(err.to_string().starts_with("validation failed: "));
    }
}
