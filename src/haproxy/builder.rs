//! Working configuration built on top of a base template.

use std::fmt;

use crate::haproxy::directive::{Bind, Server};
use crate::haproxy::template::BaseTemplate;
use crate::haproxy::types::{is_valid_identifier, BuildError, SectionKind};

#[derive(Debug, Clone)]
enum Directive {
    Bind(Bind),
    UseBackend(String),
    Server(Server),
}

#[derive(Debug, Clone)]
struct Section {
    kind: SectionKind,
    name: String,
    directives: Vec<Directive>,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.kind, self.name)?;
        for directive in &self.directives {
            match directive {
                Directive::Bind(bind) => writeln!(f, "  bind {bind}")?,
                Directive::UseBackend(name) => writeln!(f, "  use_backend {name}")?,
                Directive::Server(server) => writeln!(f, "  server {server}")?,
            }
        }
        Ok(())
    }
}

/// Accumulates generated sections after an untouched copy of the base.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    base: BaseTemplate,
    sections: Vec<Section>,
}

impl ConfigBuilder {
    /// Start from a copy of `base`. The template itself is never modified.
    pub fn from_template(base: &BaseTemplate) -> Self {
        Self {
            base: base.clone(),
            sections: Vec::new(),
        }
    }

    /// Create an empty named section.
    pub fn create_section(&mut self, kind: SectionKind, name: &str) -> Result<(), BuildError> {
        if !is_valid_identifier(name) {
            return Err(BuildError::InvalidSectionName {
                kind,
                name: name.to_string(),
            });
        }

        let exists_in_base = self.base.find_conflict(&kind, name).is_some();
        let exists_generated = self
            .sections
            .iter()
            .any(|s| s.name == name && s.kind.conflicts_with(&kind));

        if exists_in_base || exists_generated {
            return Err(BuildError::SectionExists {
                kind,
                name: name.to_string(),
            });
        }

        self.sections.push(Section {
            kind,
            name: name.to_string(),
            directives: Vec::new(),
        });
        Ok(())
    }

    /// Append a `bind` line to a frontend.
    pub fn insert_bind(&mut self, frontend: &str, address: &str) -> Result<(), BuildError> {
        let bind: Bind = address.parse()?;
        let section = self.section_mut(SectionKind::Frontend, frontend)?;
        section.directives.push(Directive::Bind(bind));
        Ok(())
    }

    /// Set the frontend's `use_backend`, replacing any previous value.
    pub fn set_use_backend(&mut self, frontend: &str, backend: &str) -> Result<(), BuildError> {
        if !is_valid_identifier(backend) {
            return Err(BuildError::InvalidSectionName {
                kind: SectionKind::Backend,
                name: backend.to_string(),
            });
        }

        let section = self.section_mut(SectionKind::Frontend, frontend)?;
        section
            .directives
            .retain(|d| !matches!(d, Directive::UseBackend(_)));
        section
            .directives
            .push(Directive::UseBackend(backend.to_string()));
        Ok(())
    }

    /// Append a server to a backend. Server names are unique per backend.
    pub fn add_server(&mut self, backend: &str, server: Server) -> Result<(), BuildError> {
        let section = self.section_mut(SectionKind::Backend, backend)?;

        let duplicate = section
            .directives
            .iter()
            .any(|d| matches!(d, Directive::Server(s) if s.name == server.name));
        if duplicate {
            return Err(BuildError::DuplicateServer {
                backend: backend.to_string(),
                server: server.name,
            });
        }

        section.directives.push(Directive::Server(server));
        Ok(())
    }

    /// Render the base text followed by every generated section.
    pub fn render(&self) -> String {
        let mut out = self.base.text().to_string();

        for section in &self.sections {
            if !out.is_empty() {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                if !out.ends_with("\n\n") {
                    out.push('\n');
                }
            }

            out.push_str(&section.to_string());
        }

        out
    }

    fn section_mut(&mut self, kind: SectionKind, name: &str) -> Result<&mut Section, BuildError> {
        self.sections
            .iter_mut()
            .find(|s| s.kind == kind && s.name == name)
            .ok_or_else(|| BuildError::SectionMissing {
                kind,
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haproxy::directive::ServerOptions;

    fn base() -> BaseTemplate {
        BaseTemplate::parse("global\n  maxconn 100\n\nbackend existing\n  mode tcp\n").unwrap()
    }

    fn server(name: &str) -> Server {
        Server::new(name, "10.1.1.1:80", "check".parse::<ServerOptions>().unwrap()).unwrap()
    }

    #[test]
    fn test_render_without_sections_is_base() {
        let builder = ConfigBuilder::from_template(&base());
        assert_eq!(builder.render(), base().text());
    }

    #[test]
    fn test_collision_with_base_section() {
        let mut builder = ConfigBuilder::from_template(&base());
        let err = builder
            .create_section(SectionKind::Backend, "existing")
            .unwrap_err();
        assert!(matches!(err, BuildError::SectionExists { .. }));

        // A frontend may share a backend's name.
        builder
            .create_section(SectionKind::Frontend, "existing")
            .unwrap();
    }

    #[test]
    fn test_collision_with_generated_section() {
        let mut builder = ConfigBuilder::from_template(&base());
        builder.create_section(SectionKind::Frontend, "web").unwrap();
        assert!(builder.create_section(SectionKind::Frontend, "web").is_err());
    }

    #[test]
    fn test_directives_require_section() {
        let mut builder = ConfigBuilder::from_template(&base());
        let err = builder.insert_bind("missing", "ipv4@:80").unwrap_err();
        assert!(matches!(err, BuildError::SectionMissing { .. }));
        assert!(builder.add_server("missing", server("s1")).is_err());
    }

    #[test]
    fn test_use_backend_is_replaced() {
        let mut builder = ConfigBuilder::from_template(&BaseTemplate::default());
        builder.create_section(SectionKind::Frontend, "web").unwrap();
        builder.set_use_backend("web", "a").unwrap();
        builder.set_use_backend("web", "b").unwrap();
        assert_eq!(builder.render(), "frontend web\n  use_backend b\n");
    }

    #[test]
    fn test_duplicate_server_rejected() {
        let mut builder = ConfigBuilder::from_template(&base());
        builder.create_section(SectionKind::Backend, "web").unwrap();
        builder.add_server("web", server("s1")).unwrap();
        let err = builder.add_server("web", server("s1")).unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateServer {
                backend: "web".into(),
                server: "s1".into()
            }
        );
        assert_eq!(builder.render().matches("  server s1 ").count(), 1);
    }

    #[test]
    fn test_render_appends_sections() {
        let mut builder = ConfigBuilder::from_template(&base());
        builder.create_section(SectionKind::Frontend, "web").unwrap();
        builder.insert_bind("web", "ipv4@:80").unwrap();
        builder.set_use_backend("web", "web").unwrap();
        builder.create_section(SectionKind::Backend, "web").unwrap();
        builder.add_server("web", server("s1")).unwrap();

        let expected = "global\n  maxconn 100\n\nbackend existing\n  mode tcp\n\
\n\
frontend web\n  bind ipv4@:80\n  use_backend web\n\
\n\
backend web\n  server s1 10.1.1.1:80 check\n";
        assert_eq!(builder.render(), expected);
    }
}
