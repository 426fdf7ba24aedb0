//! Core data models used throughout gitscope.
//!
//! These types represent the snapshot of a repository at one revision, the
//! files inside it, the policy documents applied to them, and the rules a
//! caller filters with.

use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Language label for files that could not be classified.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// A repository's file tree at one resolved revision.
///
/// `base_hash` is always a concrete commit id, never a symbolic reference.
/// A snapshot is not mutated once built: filtering derives a new one.
#[derive(Debug, Clone, Default)]
pub struct RepositorySnapshot {
    pub base_url: String,
    pub base_hash: String,
    /// Path filter the snapshot was walked with, or `/` for the whole tree.
    pub base_dir: String,
    pub file_count: usize,
    /// Distinct detected languages in first-seen order.
    pub languages: Vec<String>,
    /// Full paths of files whose language could not be determined.
    pub unknown_languages: Vec<String>,
    pub policy: Option<PolicyDocument>,
    pub files: Vec<FileEntry>,
}

/// A single file inside a [`RepositorySnapshot`].
#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    /// Display name, relative to the matched subtree when walked with a filter.
    pub name: String,
    /// Content-addressed blob id.
    pub hash: String,
    pub url: String,
    /// Whether the file is a recognized configuration file.
    pub config: bool,
    pub language: String,
    /// Rule name, set once a filter rule keeps the file.
    pub kind: String,
    pub output_policy: String,
    pub applied_policy: String,
    /// Text view of `raw`, lossily decoded.
    pub content: String,
    pub raw: Vec<u8>,
}

impl FileEntry {
    /// Fresh reader over the raw blob bytes.
    ///
    /// Readers borrow from the entry, so they never outlive the snapshot
    /// that owns it and are never carried into serialized output.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.raw.as_slice())
    }
}

/// Declarative policy text handed to the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    /// Path inside the snapshot, rule URL, or default policy path.
    pub name: String,
    pub content: String,
}

/// A named file-name pattern with an optional policy source.
///
/// Serialized as `{"name": "Docker", "filter": "\\bDockerfile\\b", "policy": ""}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub filter: String,
    /// Explicit policy URL; empty means "use the snapshot's or the default".
    #[serde(default, rename = "policy")]
    pub policy_url: String,
}

impl Rule {
    pub fn new(name: &str, filter: &str, policy_url: &str) -> Self {
        Self {
            name: name.to_string(),
            filter: filter.to_string(),
            policy_url: policy_url.to_string(),
        }
    }
}

/// The three caller inputs of a snapshot retrieval.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRequest {
    pub url: String,
    /// Revision to inspect; `None` or empty resolves HEAD.
    pub revision: Option<String>,
    /// Path filter; `None` or empty walks the whole tree.
    pub path_filter: Option<String>,
}

impl SnapshotRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn with_revision(mut self, revision: &str) -> Self {
        self.revision = Some(revision.to_string());
        self
    }

    pub fn with_path_filter(mut self, filter: &str) -> Self {
        self.path_filter = Some(filter.to_string());
        self
    }

    pub(crate) fn revision(&self) -> Option<&str> {
        self.revision.as_deref().filter(|r| !r.is_empty())
    }

    pub(crate) fn path_filter(&self) -> Option<&str> {
        self.path_filter.as_deref().filter(|f| !f.is_empty())
    }
}
