//! Base configuration template.
//!
//! The template is the externally supplied skeleton (`global`, `defaults`, and
//! any hand-written sections). It is indexed by section so collisions can be
//! detected, but its text is kept byte-for-byte and never rewritten.

use std::fs;
use std::path::Path;

use crate::haproxy::types::{SectionKind, TemplateError};

/// A section header found in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub kind: SectionKind,
    /// `None` for unnamed sections such as `global` or a bare `defaults`.
    pub name: Option<String>,
    /// 1-based line number of the header.
    pub line: usize,
}

/// Parsed, immutable base template.
#[derive(Debug, Clone, Default)]
pub struct BaseTemplate {
    text: String,
    sections: Vec<SectionHeader>,
}

impl BaseTemplate {
    /// Read and parse a template from disk.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(text)
    }

    /// Parse template text.
    pub fn parse(text: impl Into<String>) -> Result<Self, TemplateError> {
        let text = text.into();
        let mut sections = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let content = strip_comment(raw).trim();
            if content.is_empty() {
                continue;
            }

            let mut words = content.split_whitespace();
            let first = words.next().unwrap_or_default();

            match SectionKind::from_keyword(first) {
                Some(kind) => {
                    let name = words.next().map(str::to_string);
                    if name.is_none() && requires_name(&kind) {
                        return Err(TemplateError::MissingSectionName { line, kind });
                    }
                    sections.push(SectionHeader { kind, name, line });
                }
                None if sections.is_empty() => {
                    return Err(TemplateError::OrphanDirective {
                        line,
                        text: content.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok(Self { text, sections })
    }

    /// The original template text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    /// Return the first section that would clash with a new `kind` section
    /// called `name`.
    pub fn find_conflict(&self, kind: &SectionKind, name: &str) -> Option<&SectionHeader> {
        self.sections
            .iter()
            .find(|s| s.name.as_deref() == Some(name) && s.kind.conflicts_with(kind))
    }
}

fn requires_name(kind: &SectionKind) -> bool {
    matches!(
        kind,
        SectionKind::Frontend | SectionKind::Backend | SectionKind::Listen
    )
}

/// Drop a trailing `#` comment. Escaped or quoted `#` characters are rare in
/// section headers and are not handled.
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}
