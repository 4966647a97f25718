//! HAProxy configuration synthesis.
//!
//! # Data Flow
//! ```text
//! base template (file)
//!     → template.rs (section index, text kept verbatim)
//!     → builder.rs (clone, append frontend/backend sections)
//!     → directive.rs (typed bind / server / server options)
//!     → rendered configuration text
//! ```
//!
//! Synthesis is a pure function of the template and the desired state.
//! Every Port yields exactly one frontend and one backend, every Origin one
//! server line.

pub mod builder;
pub mod directive;
pub mod synth;
pub mod template;
pub mod types;

pub use synth::{synthesize, synthesize_with_family};
pub use template::BaseTemplate;
pub use types::{BuildError, SectionKind, SynthesisError, TemplateError, DEFAULT_ADDRESS_FAMILY};
