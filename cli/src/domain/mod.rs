//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod agent;
pub mod config;
pub mod error;
pub mod manifest;
pub mod project;
pub mod scale;
pub mod system;
pub mod template;

pub use agent::{AgentEvent, VmSpec, VmStatus};
pub use config::DevrigConfig;
pub use error::{AgentError, CommandFailed, ManifestError, ProjectError, TemplateError};
pub use manifest::{Manifest, SystemDefinition};
pub use scale::{ScaleAction, ScaleOptions, ScaleReport, ScaleTarget};
pub use system::{Container, System};
