//! Version-control access abstraction.
//!
//! The [`RepoAccess`] trait is everything the snapshot walker needs from a
//! repository: resolve a revision, list the files of a commit's tree, and read
//! a blob. [`GitRepository`] drives the `git` CLI; [`MemoryRepository`] keeps
//! commits in memory for tests and embedding.

pub mod git;
pub mod memory;

pub use git::GitRepository;
pub use memory::MemoryRepository;

use crate::error::Result;

/// One blob in a commit tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    /// Full path from the repository root, `/`-separated.
    pub path: String,
    /// Content-addressed blob id.
    pub blob_id: String,
}

/// The file listing of a resolved commit, in the repository's native order.
#[derive(Debug, Clone)]
pub struct Tree {
    pub commit: String,
    pub files: Vec<TreeFile>,
}

/// Repository access used by snapshot retrieval.
///
/// Implementations must be `Send + Sync` so one opened repository can serve
/// several callers.
pub trait RepoAccess: Send + Sync {
    /// Location the repository was opened from; used for browsable URLs.
    fn location(&self) -> &str;

    /// Resolve `revision` (or HEAD when `None`) to a concrete commit id.
    fn resolve_revision(&self, revision: Option<&str>) -> Result<String>;

    /// List every blob reachable from `commit`'s root tree.
    fn tree(&self, commit: &str) -> Result<Tree>;

    /// Read a blob's full contents.
    fn read_blob(&self, file: &TreeFile) -> Result<Vec<u8>>;
}
