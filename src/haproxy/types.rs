//! Section kinds and error definitions for config synthesis.

use std::fmt;
use thiserror::Error;

/// Address family used for generated frontend binds.
pub const DEFAULT_ADDRESS_FAMILY: &str = "ipv4";

/// Address prefixes accepted in a `bind` directive that targets a port.
pub const BIND_ADDRESS_FAMILIES: &[&str] = &[
    "ipv4", "ipv6", "tcp", "tcp4", "tcp6", "udp", "udp4", "udp6", "quic4", "quic6",
];

/// HAProxy configuration section keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Global,
    Defaults,
    Frontend,
    Backend,
    Listen,
    /// Any other section keyword (`userlist`, `resolvers`, `peers`, ...).
    Other(String),
}

impl SectionKind {
    /// Classify a line's first token, returning `None` when it is not a
    /// section keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "global" => SectionKind::Global,
            "defaults" => SectionKind::Defaults,
            "frontend" => SectionKind::Frontend,
            "backend" => SectionKind::Backend,
            "listen" => SectionKind::Listen,
            "userlist" | "peers" | "resolvers" | "mailers" | "program" | "http-errors"
            | "ring" | "cache" | "fcgi-app" | "crt-store" => SectionKind::Other(word.to_string()),
            _ => return None,
        };
        Some(kind)
    }

    pub fn keyword(&self) -> &str {
        match self {
            SectionKind::Global => "global",
            SectionKind::Defaults => "defaults",
            SectionKind::Frontend => "frontend",
            SectionKind::Backend => "backend",
            SectionKind::Listen => "listen",
            SectionKind::Other(word) => word,
        }
    }

    /// Whether a section of this kind and one of `other` may not share a name.
    ///
    /// Frontends and backends live in separate namespaces, but a `listen`
    /// section is both and clashes with either.
    pub fn conflicts_with(&self, other: &SectionKind) -> bool {
        match (self, other) {
            (SectionKind::Listen, SectionKind::Frontend | SectionKind::Backend | SectionKind::Listen) => true,
            (SectionKind::Frontend | SectionKind::Backend, SectionKind::Listen) => true,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Errors reading or parsing the base template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read base template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A directive appeared before any section header.
    #[error("line {line}: directive outside of any section: {text}")]
    OrphanDirective { line: usize, text: String },

    /// A named section header without a name.
    #[error("line {line}: {kind} section requires a name")]
    MissingSectionName { line: usize, kind: SectionKind },
}

/// Low-level failures from the configuration builder.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("{kind} section {name} already exists")]
    SectionExists { kind: SectionKind, name: String },

    #[error("{kind} section {name} does not exist")]
    SectionMissing { kind: SectionKind, name: String },

    #[error("invalid {kind} section name {name:?}")]
    InvalidSectionName { kind: SectionKind, name: String },

    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    #[error("server {server} already exists in backend {backend}")]
    DuplicateServer { backend: String, server: String },

    #[error("invalid server address {0:?}")]
    InvalidServerAddress(String),

    #[error("invalid bind address {address:?}: {reason}")]
    InvalidBind { address: String, reason: String },

    #[error("invalid server options {options:?}: {reason}")]
    InvalidServerOptions { options: String, reason: String },
}

/// Errors produced while synthesizing a configuration.
///
/// Every variant names the port (section) or origin it failed on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("failed to create frontend section for port {port}: {source}")]
    FrontendSection {
        port: String,
        #[source]
        source: BuildError,
    },

    #[error("failed to insert bind directive for port {port}: {source}")]
    Bind {
        port: String,
        #[source]
        source: BuildError,
    },

    #[error("failed to set use_backend for port {port}: {source}")]
    UseBackend {
        port: String,
        #[source]
        source: BuildError,
    },

    #[error("failed to create backend section for port {port}: {source}")]
    BackendSection {
        port: String,
        #[source]
        source: BuildError,
    },

    #[error("failed to parse server options for origin {origin} in backend {backend}: {source}")]
    ServerOptions {
        backend: String,
        origin: String,
        #[source]
        source: BuildError,
    },

    #[error("failed to insert server {origin} into backend {backend}: {source}")]
    ServerInsert {
        backend: String,
        origin: String,
        #[source]
        source: BuildError,
    },
}

impl SynthesisError {
    /// The section (port) identifier the failure is attributed to.
    pub fn section(&self) -> &str {
        match self {
            SynthesisError::FrontendSection { port, .. }
            | SynthesisError::Bind { port, .. }
            | SynthesisError::UseBackend { port, .. }
            | SynthesisError::BackendSection { port, .. } => port,
            SynthesisError::ServerOptions { backend, .. }
            | SynthesisError::ServerInsert { backend, .. } => backend,
        }
    }
}

/// Whether `name` can be used as a section or server name.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_keywords() {
        assert_eq!(SectionKind::from_keyword("frontend"), Some(SectionKind::Frontend));
        assert_eq!(
            SectionKind::from_keyword("resolvers"),
            Some(SectionKind::Other("resolvers".into()))
        );
        assert_eq!(SectionKind::from_keyword("bind"), None);
    }

    #[test]
    fn test_listen_conflicts_with_proxies() {
        assert!(SectionKind::Listen.conflicts_with(&SectionKind::Frontend));
        assert!(SectionKind::Backend.conflicts_with(&SectionKind::Listen));
        assert!(SectionKind::Frontend.conflicts_with(&SectionKind::Frontend));
        assert!(!SectionKind::Frontend.conflicts_with(&SectionKind::Backend));
    }

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("loadprt-test"));
        assert!(is_valid_identifier("a_b.c:d"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("has space"));
    }
}
