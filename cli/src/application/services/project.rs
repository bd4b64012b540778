//! Application service: fetch a git project before `start`.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::Path;
use std::process::Output;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::application::ports::{GitClient, LocalFs, ProgressReporter};
use crate::domain::error::ProjectError;
use crate::domain::project::{
    BRANCH_CLONE_MIN_GIT, DEFAULT_REF, ProjectRequest, classify_git_error, is_branch_or_tag,
    parse_git_version, parse_ls_remote,
};

/// Outcome of [`fetch_project`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The destination already existed; nothing was fetched.
    AlreadyPresent,
    /// The branch or tag was cloned directly.
    Cloned,
    /// The default branch was cloned and `git_ref` checked out.
    CheckedOut,
}

/// Clone `request.git_url` into `request.destination`.
///
/// # Errors
///
/// Returns a [`ProjectError`] when a git call fails, or an error if git
/// cannot be run or reports an unparsable version.
pub async fn fetch_project(
    git: &impl GitClient,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    request: &ProjectRequest,
) -> Result<FetchOutcome> {
    let raw_version = git.version().await.context("running git --version")?;
    let version = parse_git_version(&raw_version)
        .with_context(|| format!("unrecognised git version: {}", raw_version.trim()))?;
    let branch_clone = version >= BRANCH_CLONE_MIN_GIT;
    reporter.step(&format!("git {version} found"));

    let remote = check(
        git.ls_remote(&request.git_url).await.context("running git ls-remote")?,
        request,
        false,
    )?;
    reporter.step(&format!("fetched remote refs of {}", request.git_url));
    let refs = parse_ls_remote(&String::from_utf8_lossy(&remote.stdout));
    let named_ref = is_branch_or_tag(&refs, &request.git_ref);
    debug!(git_ref = %request.git_ref, named_ref, refs = refs.len(), "resolved remote refs");

    reporter.step(&format!("checking destination {}...", request.destination));
    if fs.exists(Path::new(&request.destination)) {
        let what = if named_ref { "branch or tag" } else { "commit" };
        reporter.warn(&format!(
            "{} already exists, skipping clone of {} ({what} {})",
            request.destination, request.git_url, request.git_ref
        ));
        return Ok(FetchOutcome::AlreadyPresent);
    }

    if named_ref && branch_clone {
        reporter.step(&format!(
            "cloning {}#{} to {}...",
            request.git_url, request.git_ref, request.destination
        ));
        let out = git
            .clone_repo(&request.git_url, Some(&request.git_ref), &request.destination)
            .await
            .context("running git clone")?;
        check(out, request, true)?;
        info!(url = %request.git_url, git_ref = %request.git_ref, "project cloned");
        reporter.success(&format!("cloned {} to {}", request.git_url, request.destination));
        return Ok(FetchOutcome::Cloned);
    }

    reporter.step(&format!("cloning {} to {}...", request.git_url, request.destination));
    let branch = branch_clone.then_some(DEFAULT_REF);
    let out = git
        .clone_repo(&request.git_url, branch, &request.destination)
        .await
        .context("running git clone")?;
    check(out, request, true)?;

    reporter.step(&format!("checking out {}...", request.git_ref));
    let out = git
        .checkout(&request.destination, &request.git_ref)
        .await
        .context("running git checkout")?;
    check(out, request, true)?;
    info!(url = %request.git_url, git_ref = %request.git_ref, "project checked out");
    reporter.success(&format!(
        "checked out {} at {} in {}",
        request.git_url, request.git_ref, request.destination
    ));
    Ok(FetchOutcome::CheckedOut)
}

fn check(out: Output, request: &ProjectRequest, with_target: bool) -> Result<Output, ProjectError> {
    if out.status.success() {
        return Ok(out);
    }
    let message = String::from_utf8_lossy(&out.stderr).trim().to_string();
    Err(ProjectError {
        kind: classify_git_error(&message),
        url: request.git_url.clone(),
        git_ref: with_target.then(|| request.git_ref.clone()),
        destination: with_target.then(|| request.destination.clone()),
        output: message,
    })
}
