//! Desired state → HAProxy configuration.

use crate::haproxy::builder::ConfigBuilder;
use crate::haproxy::directive::{Server, ServerOption, ServerOptions};
use crate::haproxy::template::BaseTemplate;
use crate::haproxy::types::{BuildError, SectionKind, SynthesisError, DEFAULT_ADDRESS_FAMILY};
use crate::lbapi::{LoadBalancer, Origin};

/// Synthesize a configuration binding frontends on the default address family.
pub fn synthesize(base: &BaseTemplate, lb: &LoadBalancer) -> Result<String, SynthesisError> {
    synthesize_with_family(base, lb, DEFAULT_ADDRESS_FAMILY)
}

/// Extend `base` with one frontend and one backend per port.
///
/// Sections are named after the port identifier; every origin of every pool
/// becomes a server named after the origin identifier. Output order follows
/// input order, so identical input renders identical text. Neither input is
/// modified.
pub fn synthesize_with_family(
    base: &BaseTemplate,
    lb: &LoadBalancer,
    address_family: &str,
) -> Result<String, SynthesisError> {
    let mut cfg = ConfigBuilder::from_template(base);

    for port in &lb.ports {
        let name = port.id.as_str();

        cfg.create_section(SectionKind::Frontend, name)
            .map_err(|source| SynthesisError::FrontendSection {
                port: name.to_string(),
                source,
            })?;

        cfg.insert_bind(name, &format!("{}@:{}", address_family, port.number))
            .map_err(|source| SynthesisError::Bind {
                port: name.to_string(),
                source,
            })?;

        cfg.set_use_backend(name, name)
            .map_err(|source| SynthesisError::UseBackend {
                port: name.to_string(),
                source,
            })?;

        cfg.create_section(SectionKind::Backend, name)
            .map_err(|source| SynthesisError::BackendSection {
                port: name.to_string(),
                source,
            })?;

        for origin in port.origins() {
            let options = server_options(origin).map_err(|source| SynthesisError::ServerOptions {
                backend: name.to_string(),
                origin: origin.id.clone(),
                source,
            })?;

            let address = format!("{}:{}", origin.target, origin.port_number);

            Server::new(origin.id.as_str(), address, options)
                .and_then(|server| cfg.add_server(name, server))
                .map_err(|source| SynthesisError::ServerInsert {
                    backend: name.to_string(),
                    origin: origin.id.clone(),
                    source,
                })?;
        }

        tracing::trace!(
            port.id = %port.id,
            port.number = port.number,
            servers = port.origin_count(),
            "Synthesized port sections"
        );
    }

    Ok(cfg.render())
}

/// `check port <port> weight <weight>`, plus `disabled` for inactive origins.
fn server_options(origin: &Origin) -> Result<ServerOptions, BuildError> {
    let text = format!(
        "check port {} weight {}",
        origin.port_number, origin.weight
    );
    let mut options: ServerOptions = text.parse()?;
    if !origin.active {
        options.push(ServerOption::Disabled);
    }
    Ok(options)
}
