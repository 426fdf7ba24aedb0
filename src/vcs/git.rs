use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

use super::{RepoAccess, Tree, TreeFile};
use crate::error::{Result, SnapshotError};

/// A bare clone driven through the `git` CLI.
///
/// Workflow:
/// 1. Derive a cache directory from a hash of the URL.
/// 2. Clone (bare) when absent, otherwise open the existing clone.
/// 3. Resolve revisions with `rev-parse`, list trees with `ls-tree`, and
///    read blobs with `cat-file`.
#[derive(Debug, Clone)]
pub struct GitRepository {
    url: String,
    dir: PathBuf,
}

impl GitRepository {
    /// Clone `url` under `cache_root`, or open the clone already there.
    ///
    /// An existing clone is not an error: it is opened instead, and fetched
    /// first when `fetch` is set.
    pub fn open_or_clone(url: &str, cache_root: &Path, fetch: bool) -> Result<Self> {
        let dir = cache_root.join(short_hash(url));

        if is_bare_repo(&dir) {
            debug!(url, dir = %dir.display(), "repository already exists, opening");
            let repo = Self::open(url, &dir)?;
            if fetch {
                repo.fetch()?;
            }
            return Ok(repo);
        }

        std::fs::create_dir_all(&dir).map_err(|e| SnapshotError::RepositoryAccess {
            op: "git.clone",
            location: url.to_string(),
            message: format!("creating cache directory {}: {}", dir.display(), e),
        })?;

        info!(url, dir = %dir.display(), "cloning repository");
        let output = Command::new("git")
            .args(["clone", "--bare", "--quiet"])
            .arg(url)
            .arg(&dir)
            .output()
            .map_err(|e| SnapshotError::RepositoryAccess {
                op: "git.clone",
                location: url.to_string(),
                message: format!("failed to execute 'git clone'. Is git installed? {}", e),
            })?;

        if !output.status.success() {
            return Err(SnapshotError::RepositoryAccess {
                op: "git.clone",
                location: url.to_string(),
                message: stderr_of(&output),
            });
        }

        Ok(Self {
            url: url.to_string(),
            dir,
        })
    }

    /// Open an existing repository directory (bare or with a work tree).
    pub fn open(url: &str, dir: &Path) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(dir)
            .output()
            .map_err(|e| SnapshotError::RepositoryAccess {
                op: "git.open",
                location: url.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SnapshotError::RepositoryAccess {
                op: "git.open",
                location: url.to_string(),
                message: stderr_of(&output),
            });
        }

        Ok(Self {
            url: url.to_string(),
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn fetch(&self) -> Result<()> {
        let output = self
            .git(&["fetch", "--quiet", "origin", "+refs/heads/*:refs/heads/*"])
            .map_err(|message| SnapshotError::RepositoryAccess {
                op: "git.fetch",
                location: self.url.clone(),
                message,
            })?;

        if !output.status.success() {
            return Err(SnapshotError::RepositoryAccess {
                op: "git.fetch",
                location: self.url.clone(),
                message: stderr_of(&output),
            });
        }
        Ok(())
    }

    fn git(&self, args: &[&str]) -> std::result::Result<Output, String> {
        Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| format!("failed to execute 'git {}': {}", args[0], e))
    }
}

impl RepoAccess for GitRepository {
    fn location(&self) -> &str {
        &self.url
    }

    fn resolve_revision(&self, revision: Option<&str>) -> Result<String> {
        let rev = revision.unwrap_or("HEAD");
        let spec = format!("{}^{{commit}}", rev);
        let resolve_err = |message: String| SnapshotError::RevisionResolution {
            location: self.url.clone(),
            revision: rev.to_string(),
            message,
        };

        let output = self
            .git(&["rev-parse", "--verify", "--quiet", &spec])
            .map_err(resolve_err)?;

        if !output.status.success() {
            return Err(resolve_err("revision not found".to_string()));
        }

        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if sha.is_empty() {
            return Err(resolve_err("empty rev-parse output".to_string()));
        }
        Ok(sha)
    }

    fn tree(&self, commit: &str) -> Result<Tree> {
        let tree_err = |message: String| SnapshotError::TreeRead {
            path: format!("{}^{{tree}}", commit),
            message,
        };

        let output = self
            .git(&["ls-tree", "-r", "-z", "--full-tree", commit])
            .map_err(tree_err)?;

        if !output.status.success() {
            return Err(tree_err(stderr_of(&output)));
        }

        let files = parse_ls_tree(&output.stdout);
        Ok(Tree {
            commit: commit.to_string(),
            files,
        })
    }

    fn read_blob(&self, file: &TreeFile) -> Result<Vec<u8>> {
        let read_err = |message: String| SnapshotError::TreeRead {
            path: file.path.clone(),
            message,
        };

        let output = self
            .git(&["cat-file", "blob", &file.blob_id])
            .map_err(read_err)?;

        if !output.status.success() {
            return Err(read_err(stderr_of(&output)));
        }
        Ok(output.stdout)
    }
}

/// Parse `git ls-tree -r -z` output: `<mode> SP <type> SP <id> TAB <path> NUL`.
///
/// Only blobs are kept; submodule (`commit`) entries have no content here.
fn parse_ls_tree(stdout: &[u8]) -> Vec<TreeFile> {
    stdout
        .split(|b| *b == 0)
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let record = String::from_utf8_lossy(record);
            let (meta, path) = record.split_once('\t')?;
            let mut parts = meta.split(' ');
            let _mode = parts.next()?;
            let kind = parts.next()?;
            let id = parts.next()?;
            if kind != "blob" {
                return None;
            }
            Some(TreeFile {
                path: path.to_string(),
                blob_id: id.to_string(),
            })
        })
        .collect()
}

fn is_bare_repo(dir: &Path) -> bool {
    dir.join("HEAD").is_file() && dir.join("objects").is_dir()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}
