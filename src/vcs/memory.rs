//! In-memory [`RepoAccess`] implementation for tests and embedding.
//!
//! Commits are plain ordered lists of `(path, bytes)`. Blob ids are SHA-256
//! digests of the content, so identical files share an id the way git blobs
//! do. Reads of paths registered with [`MemoryRepository::fail_reads_of`]
//! return a [`SnapshotError::TreeRead`].

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use super::{RepoAccess, Tree, TreeFile};
use crate::error::{Result, SnapshotError};

pub struct MemoryRepository {
    location: String,
    commits: HashMap<String, Vec<TreeFile>>,
    refs: HashMap<String, String>,
    blobs: HashMap<String, Vec<u8>>,
    head: Option<String>,
    failing: HashSet<String>,
}

impl MemoryRepository {
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            commits: HashMap::new(),
            refs: HashMap::new(),
            blobs: HashMap::new(),
            head: None,
            failing: HashSet::new(),
        }
    }

    /// Record a commit with the given files (in tree order) and move HEAD to it.
    ///
    /// Returns the commit id, a 40-hex digest of the tree listing.
    pub fn commit<B: AsRef<[u8]>>(&mut self, files: &[(&str, B)]) -> String {
        let mut hasher = Sha256::new();
        let mut tree = Vec::with_capacity(files.len());
        for (path, bytes) in files {
            let bytes = bytes.as_ref();
            let blob_id = blob_id(bytes);
            hasher.update(path.as_bytes());
            hasher.update(blob_id.as_bytes());
            self.blobs.insert(blob_id.clone(), bytes.to_vec());
            tree.push(TreeFile {
                path: path.to_string(),
                blob_id,
            });
        }
        hasher.update(self.commits.len().to_le_bytes());
        let id = format!("{:x}", hasher.finalize())[..40].to_string();

        self.commits.insert(id.clone(), tree);
        self.head = Some(id.clone());
        id
    }

    /// Point a symbolic name (branch or tag) at an existing commit.
    pub fn tag(&mut self, name: &str, commit: &str) {
        self.refs.insert(name.to_string(), commit.to_string());
    }

    /// Make every read of `path` fail.
    pub fn fail_reads_of(&mut self, path: &str) {
        self.failing.insert(path.to_string());
    }
}

impl RepoAccess for MemoryRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn resolve_revision(&self, revision: Option<&str>) -> Result<String> {
        let not_found = |rev: &str, message: &str| SnapshotError::RevisionResolution {
            location: self.location.clone(),
            revision: rev.to_string(),
            message: message.to_string(),
        };

        match revision {
            None | Some("HEAD") => self
                .head
                .clone()
                .ok_or_else(|| not_found("HEAD", "repository has no commits")),
            Some(rev) => {
                if self.commits.contains_key(rev) {
                    return Ok(rev.to_string());
                }
                if let Some(id) = self.refs.get(rev) {
                    return Ok(id.clone());
                }
                // Unambiguous abbreviated ids resolve like git's short hashes.
                let matches: Vec<&String> = self
                    .commits
                    .keys()
                    .filter(|id| rev.len() >= 4 && id.starts_with(rev))
                    .collect();
                match matches.as_slice() {
                    [one] => Ok((*one).clone()),
                    [] => Err(not_found(rev, "revision not found")),
                    _ => Err(not_found(rev, "ambiguous revision")),
                }
            }
        }
    }

    fn tree(&self, commit: &str) -> Result<Tree> {
        let files = self
            .commits
            .get(commit)
            .cloned()
            .ok_or_else(|| SnapshotError::TreeRead {
                path: format!("{}^{{tree}}", commit),
                message: "commit not found".to_string(),
            })?;
        Ok(Tree {
            commit: commit.to_string(),
            files,
        })
    }

    fn read_blob(&self, file: &TreeFile) -> Result<Vec<u8>> {
        if self.failing.contains(&file.path) {
            return Err(SnapshotError::TreeRead {
                path: file.path.clone(),
                message: "injected read failure".to_string(),
            });
        }
        self.blobs
            .get(&file.blob_id)
            .cloned()
            .ok_or_else(|| SnapshotError::TreeRead {
                path: file.path.clone(),
                message: format!("blob {} not found", file.blob_id),
            })
    }
}

fn blob_id(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_and_tags_resolve() {
        let mut repo = MemoryRepository::new("https://example.com/r");
        let first = repo.commit(&[("a.txt", "one")]);
        repo.tag("v1", &first);
        let second = repo.commit(&[("a.txt", "two")]);

        assert_eq!(repo.resolve_revision(None).unwrap(), second);
        assert_eq!(repo.resolve_revision(Some("v1")).unwrap(), first);
        assert_eq!(repo.resolve_revision(Some(&first[..8])).unwrap(), first);
        assert_eq!(first.len(), 40);
    }

    #[test]
    fn test_unknown_revision_errors() {
        let mut repo = MemoryRepository::new("r");
        repo.commit(&[("a.txt", "one")]);
        let err = repo.resolve_revision(Some("deadbeef")).unwrap_err();
        assert!(matches!(err, SnapshotError::RevisionResolution { .. }));
    }

    #[test]
    fn test_empty_repo_has_no_head() {
        let repo = MemoryRepository::new("r");
        assert!(repo.resolve_revision(None).is_err());
    }

    #[test]
    fn test_identical_content_shares_blob_id() {
        let mut repo = MemoryRepository::new("r");
        let id = repo.commit(&[("a", "same"), ("b", "same")]);
        let tree = repo.tree(&id).unwrap();
        assert_eq!(tree.files[0].blob_id, tree.files[1].blob_id);
    }
}
