//! Templating layer.
//!
//! Flow-file parsing/validation (YAML/Jsonnet → Flow, JSON-Schema checking) and
//! step-dependency analysis are external collaborators' jobs and live outside this
//! crate; the engine accepts any `Flow` matching the data model as-is.

pub mod template;

pub use template::Templater;
