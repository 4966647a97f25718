//! Typed directives emitted into generated sections.

use std::fmt;
use std::str::FromStr;

use crate::haproxy::types::{is_valid_identifier, BuildError, BIND_ADDRESS_FAMILIES};

/// Largest weight the proxy accepts for a server.
pub const MAX_SERVER_WEIGHT: u16 = 256;

/// A `bind <family>@<host>:<port>` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    pub family: String,
    /// Empty means all addresses.
    pub host: String,
    pub port: u16,
}

impl FromStr for Bind {
    type Err = BuildError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| BuildError::InvalidBind {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let (family, rest) = address
            .split_once('@')
            .ok_or_else(|| invalid("missing address family prefix"))?;

        if !BIND_ADDRESS_FAMILIES.contains(&family) {
            return Err(invalid("unsupported address family"));
        }

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;

        let port: u16 = port.parse().map_err(|_| invalid("port is not a number in 1-65535"))?;
        if port == 0 {
            return Err(invalid("port is not a number in 1-65535"));
        }

        Ok(Self {
            family: family.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.family, self.host, self.port)
    }
}

/// A single server option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOption {
    /// Enable health checks.
    Check,
    /// Health check port.
    Port(u16),
    Weight(u16),
    /// Start the server in maintenance mode.
    Disabled,
}

impl fmt::Display for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerOption::Check => f.write_str("check"),
            ServerOption::Port(port) => write!(f, "port {port}"),
            ServerOption::Weight(weight) => write!(f, "weight {weight}"),
            ServerOption::Disabled => f.write_str("disabled"),
        }
    }
}

/// Ordered server option list, e.g. `check port 2222 weight 20 disabled`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerOptions(Vec<ServerOption>);

impl ServerOptions {
    pub fn iter(&self) -> impl Iterator<Item = &ServerOption> {
        self.0.iter()
    }

    pub fn is_disabled(&self) -> bool {
        self.0.contains(&ServerOption::Disabled)
    }

    pub fn push(&mut self, option: ServerOption) {
        self.0.push(option);
    }
}

impl FromStr for ServerOptions {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| BuildError::InvalidServerOptions {
            options: s.to_string(),
            reason,
        };

        let mut options = Vec::new();
        let mut tokens = s.split_whitespace();

        while let Some(token) = tokens.next() {
            let option = match token {
                "check" => ServerOption::Check,
                "disabled" => ServerOption::Disabled,
                "port" => {
                    let value = tokens
                        .next()
                        .ok_or_else(|| invalid("port requires a value".into()))?;
                    match value.parse::<u16>() {
                        Ok(port) if port > 0 => ServerOption::Port(port),
                        _ => return Err(invalid(format!("invalid check port {value:?}"))),
                    }
                }
                "weight" => {
                    let value = tokens
                        .next()
                        .ok_or_else(|| invalid("weight requires a value".into()))?;
                    match value.parse::<u16>() {
                        Ok(weight) if weight <= MAX_SERVER_WEIGHT => ServerOption::Weight(weight),
                        _ => {
                            return Err(invalid(format!(
                                "weight {value:?} is not in 0-{MAX_SERVER_WEIGHT}"
                            )))
                        }
                    }
                }
                other => return Err(invalid(format!("unknown option {other:?}"))),
            };
            options.push(option);
        }

        Ok(Self(options))
    }
}

impl fmt::Display for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, option) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{option}")?;
        }
        Ok(())
    }
}

/// A `server <name> <address> [options]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub name: String,
    pub address: String,
    pub options: ServerOptions,
}

impl Server {
    /// Build a server entry, checking the name and `host:port` address.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        options: ServerOptions,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        let address = address.into();

        if !is_valid_identifier(&name) {
            return Err(BuildError::InvalidServerName(name));
        }

        let valid_address = match address.rsplit_once(':') {
            Some((host, port)) => {
                !host.is_empty()
                    && !host.chars().any(char::is_whitespace)
                    && matches!(port.parse::<u16>(), Ok(p) if p > 0)
            }
            None => false,
        };
        if !valid_address {
            return Err(BuildError::InvalidServerAddress(address));
        }

        Ok(Self {
            name,
            address,
            options,
        })
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.address)?;
        if self.options.iter().next().is_some() {
            write!(f, " {}", self.options)?;
        }
        Ok(())
    }
}
