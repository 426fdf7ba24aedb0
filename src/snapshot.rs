//! Snapshot retrieval: resolve → tree → walk → locate policy.

use tracing::info;

use crate::error::Result;
use crate::models::{RepositorySnapshot, SnapshotRequest};
use crate::policy::{self, DEFAULT_MARKER};
use crate::vcs::RepoAccess;
use crate::walker::{self, WalkOptions};

#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub walk: WalkOptions,
    /// File-name marker of in-repository policy files.
    pub policy_marker: String,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            walk: WalkOptions::default(),
            policy_marker: DEFAULT_MARKER.to_string(),
        }
    }
}

/// Build the snapshot of `repo` at the requested revision and path filter.
pub fn retrieve_snapshot(
    repo: &dyn RepoAccess,
    request: &SnapshotRequest,
    options: &RetrieveOptions,
) -> Result<RepositorySnapshot> {
    let commit = repo.resolve_revision(request.revision())?;
    info!(
        location = %repo.location(),
        revision = request.revision().unwrap_or("HEAD"),
        commit = %commit,
        "resolved revision"
    );

    let tree = repo.tree(&commit)?;
    let path_filter = request.path_filter();
    let walked = walker::walk(repo, &tree, path_filter, &options.walk)?;
    let policy = policy::locate(
        repo,
        &tree,
        path_filter,
        options.walk.path_match,
        &options.policy_marker,
    )?;

    info!(
        files = walked.file_count,
        languages = walked.languages.len(),
        unknown = walked.unknown_languages.len(),
        policy = policy.as_ref().map(|p| p.name.as_str()).unwrap_or("-"),
        "snapshot retrieved"
    );

    Ok(RepositorySnapshot {
        base_url: repo.location().to_string(),
        base_hash: commit,
        base_dir: path_filter.unwrap_or("/").to_string(),
        file_count: walked.file_count,
        languages: walked.languages,
        unknown_languages: walked.unknown_languages,
        policy,
        files: walked.files,
    })
}
