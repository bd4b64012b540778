//! Parsing rules for `devrig start <repository>`.
//!
//! Pure functions: argument interpretation, `git ls-remote` parsing and git
//! error classification. The fetch itself lives in the project service.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::ProjectErrorKind;

/// First git version able to clone a single branch or tag directly.
pub const BRANCH_CLONE_MIN_GIT: semver::Version = semver::Version::new(1, 7, 10);

/// Ref used when none is given.
pub const DEFAULT_REF: &str = "master";

#[allow(clippy::expect_used)]
static SYSTEM_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]+$").expect("valid regex"));

#[allow(clippy::expect_used)]
static REPO_WITH_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(#(.*))?$").expect("valid regex"));

#[allow(clippy::expect_used)]
static GITHUB_SHORTHAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+?)/([\w-]+)$").expect("valid regex"));

#[allow(clippy::expect_used)]
static LS_REMOTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\w+?)\s(HEAD|refs/heads/(.*)|refs/tags/(.*))$").expect("valid regex")
});

/// Arguments of `start` relevant to project fetching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartArguments<'a> {
    pub system: Option<&'a str>,
    pub git_repo: Option<&'a str>,
    pub git_ref: Option<&'a str>,
    pub dest_path: Option<&'a str>,
}

/// A project to fetch before starting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRequest {
    pub git_url: String,
    pub git_ref: String,
    pub destination: String,
}

/// Decide whether `start` was asked to fetch a repository.
///
/// Returns `None` when the arguments name a plain system (or nothing), so the
/// caller continues with a normal scale.
#[must_use]
pub fn parse_start_arguments(args: &StartArguments<'_>) -> Option<ProjectRequest> {
    let mut git_repo = args.git_repo;
    match args.system {
        None if git_repo.is_none() => return None,
        Some(system) if SYSTEM_NAME.is_match(system) => return None,
        Some(system) => git_repo = Some(system),
        None => {}
    }
    let repo_arg = git_repo?;

    let caps = REPO_WITH_REF.captures(repo_arg)?;
    let mut git_url = caps.get(1).map_or("", |m| m.as_str()).to_string();
    let repo_ref = caps.get(3).map(|m| m.as_str()).filter(|r| !r.is_empty());
    let git_ref = args
        .git_ref
        .or(repo_ref)
        .unwrap_or(DEFAULT_REF)
        .to_string();

    if let Some(caps) = GITHUB_SHORTHAND.captures(&git_url) {
        git_url = format!("https://github.com/{}/{}.git", &caps[1], &caps[2]);
    }

    let destination = match args.dest_path {
        Some(path) if path.starts_with('/') => path.to_string(),
        Some(path) => format!("./{path}"),
        None => format!("./{}", repo_basename(&git_url)),
    };

    Some(ProjectRequest {
        git_url,
        git_ref,
        destination,
    })
}

/// Last path component of a repository URL without the `.git` suffix.
fn repo_basename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let base = path.trim_end_matches('/').rsplit(['/', ':']).next().unwrap_or(path);
    base.replacen(".git", "", 1)
}

/// One ref advertised by a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub commit: String,
    /// Branch or tag name, or `HEAD`.
    pub git_ref: String,
}

/// Parse `git ls-remote` output.
#[must_use]
pub fn parse_ls_remote(output: &str) -> Vec<RemoteRef> {
    LS_REMOTE_LINE
        .captures_iter(output)
        .map(|caps| {
            let git_ref = caps
                .get(3)
                .or_else(|| caps.get(4))
                .map_or_else(|| caps[2].to_string(), |m| m.as_str().to_string());
            RemoteRef {
                commit: caps[1].to_string(),
                git_ref,
            }
        })
        .collect()
}

/// Whether `name` is a branch or tag advertised by the remote.
#[must_use]
pub fn is_branch_or_tag(refs: &[RemoteRef], name: &str) -> bool {
    refs.iter().any(|r| r.git_ref == name)
}

/// Classify a git failure from its output.
#[must_use]
pub fn classify_git_error(message: &str) -> ProjectErrorKind {
    #[allow(clippy::expect_used)]
    static PATTERNS: LazyLock<Vec<(Regex, ProjectErrorKind)>> = LazyLock::new(|| {
        [
            (r#"pathspec ['"].+?['"] did not match any file"#, ProjectErrorKind::CommitNotExist),
            (r"Could not find remote branch", ProjectErrorKind::NotAGitRepo),
            (
                r#"destination path ['"].+?['"] already exists and is not an empty directory"#,
                ProjectErrorKind::FolderAlreadyExists,
            ),
            (r"Repository not found", ProjectErrorKind::RepoNotFound),
            (r"Could not resolve host", ProjectErrorKind::NotResolveHost),
            (r#"repository ['"].*?['"] not found"#, ProjectErrorKind::RepoNotFound),
            (r"could not create work tree dir", ProjectErrorKind::CannotCreateFolder),
        ]
        .into_iter()
        .map(|(re, kind)| (Regex::new(re).expect("valid regex"), kind))
        .collect()
    });

    PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(message))
        .map_or(ProjectErrorKind::GitError, |(_, kind)| *kind)
}

/// Extract the version from `git --version` output.
#[must_use]
pub fn parse_git_version(output: &str) -> Option<semver::Version> {
    let raw = output.split_whitespace().nth(2)?;
    let mut parts = raw.split('.').map(|p| p.parse::<u64>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    Some(semver::Version::new(major, minor, patch))
}
