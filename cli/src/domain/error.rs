//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

/// Aggregate exit code when at least one system did not change state.
pub const SYSTEMS_FAILED_CODE: i32 = 2;

/// Exit code used when a hard failure carries no code of its own.
pub const DEFAULT_FAILURE_CODE: i32 = 127;

/// Exit code of a fatal agent failure.
pub const AGENT_FAILURE_CODE: i32 = 3;

// ── Template errors ───────────────────────────────────────────────────────────

/// Errors raised while expanding `${...}` placeholders in system options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unresolved placeholder '${{{token}}}' in system '{system}'")]
    Unresolved { system: String, token: String },

    #[error("Unterminated placeholder in system '{system}': {value}")]
    Unterminated { system: String, value: String },

    #[error("Value of '${{{token}}}' for system '{system}' contains placeholder syntax: {value}")]
    PlaceholderInValue {
        system: String,
        token: String,
        value: String,
    },
}

// ── Manifest errors ───────────────────────────────────────────────────────────

/// Errors related to loading and querying a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("No Devrigfile.yml found in {0} or any parent directory.")]
    NotFound(String),

    #[error("System '{0}' is not defined in the manifest.")]
    UnknownSystem(String),

    #[error("System '{system}' depends on '{dependency}', which is not defined.")]
    UnknownDependency { system: String, dependency: String },

    #[error("Circular dependency between systems: {0}")]
    CircularDependency(String),

    #[error("Invalid definition for system '{system}': {reason}")]
    InvalidSystem { system: String, reason: String },

    #[error("The manifest does not define any systems.")]
    Empty,

    #[error(transparent)]
    Template(#[from] TemplateError),
}

// ── Agent errors ──────────────────────────────────────────────────────────────

/// Fatal infrastructure errors raised by the agent lifecycle.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Virtual machine '{vm}' did not start: {ip}:{port} unreachable after {attempts} attempts.")]
    VmDidNotStart {
        vm: String,
        ip: String,
        port: u16,
        attempts: u32,
    },

    #[error("Agent teardown failed:\n{0}")]
    Teardown(String),
}

impl AgentError {
    /// Exit code surfaced for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        AGENT_FAILURE_CODE
    }
}

// ── External command errors ───────────────────────────────────────────────────

/// An external program exited unsuccessfully. Carries the program's exit code.
#[derive(Debug, Error)]
#[error("{program} failed with exit code {code}: {stderr}")]
pub struct CommandFailed {
    pub program: String,
    pub code: i32,
    pub stderr: String,
}

// ── Project fetch errors ──────────────────────────────────────────────────────

/// Classification of a failed git call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectErrorKind {
    CommitNotExist,
    NotAGitRepo,
    FolderAlreadyExists,
    RepoNotFound,
    NotResolveHost,
    CannotCreateFolder,
    GitError,
}

impl ProjectErrorKind {
    /// Short human description of the failure kind.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::CommitNotExist => "commit not found",
            Self::NotAGitRepo => "branch not found or not a git repository",
            Self::FolderAlreadyExists => "destination folder already exists and is not empty",
            Self::RepoNotFound => "repository not found",
            Self::NotResolveHost => "could not resolve host",
            Self::CannotCreateFolder => "could not create destination folder",
            Self::GitError => "git error",
        }
    }
}

/// A git call made while fetching a project failed.
#[derive(Debug, Error)]
#[error("Could not fetch {url}: {}\n{output}", .kind.describe())]
pub struct ProjectError {
    pub kind: ProjectErrorKind,
    pub url: String,
    pub git_ref: Option<String>,
    pub destination: Option<String>,
    pub output: String,
}

// ── Exit-code lookup ──────────────────────────────────────────────────────────

/// Find the exit code carried by an error chain, if any.
#[must_use]
pub fn carried_code(err: &anyhow::Error) -> Option<i32> {
    err.chain().find_map(|cause| {
        if let Some(failed) = cause.downcast_ref::<CommandFailed>() {
            Some(failed.code)
        } else {
            cause.downcast_ref::<AgentError>().map(AgentError::code)
        }
    })
}
