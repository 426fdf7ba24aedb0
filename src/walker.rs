//! Snapshot walker: turns a commit tree into classified [`FileEntry`]s.
//!
//! Every retained file is read in full. A single read failure aborts the
//! walk; there is no partial snapshot.

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::language;
use crate::models::{FileEntry, UNKNOWN_LANGUAGE};
use crate::normalize::FileFormat;
use crate::vcs::{RepoAccess, Tree};

/// File-name markers of configuration files, matched by equality or containment.
const CONFIG_MARKERS: &[&str] = &[
    "Dockerfile",
    "dockerfile.yml",
    "dockerfile.yaml",
    ".json",
    ".cform",
    ".template",
    ".tf",
    ".tf.json",
    "Manifest",
    ".gradle",
    ".properties",
];

/// How a path filter selects files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMatch {
    /// The path contains the filter anywhere. `src` also matches `rsrc/x`.
    #[default]
    Substring,
    /// The filter must equal a run of whole path segments.
    Segment,
}

impl PathMatch {
    pub fn matches(self, path: &str, filter: &str) -> bool {
        match self {
            PathMatch::Substring => path.contains(filter),
            PathMatch::Segment => {
                let wanted: Vec<&str> = filter.split('/').filter(|s| !s.is_empty()).collect();
                if wanted.is_empty() {
                    return true;
                }
                let segments: Vec<&str> = path.split('/').collect();
                segments.windows(wanted.len()).any(|w| w == wanted.as_slice())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub path_match: PathMatch,
}

/// Entries plus aggregate statistics of one walk.
#[derive(Debug, Clone, Default)]
pub struct WalkOutput {
    pub files: Vec<FileEntry>,
    pub file_count: usize,
    /// Distinct known languages in first-seen order.
    pub languages: Vec<String>,
    pub unknown_languages: Vec<String>,
}

/// Walk `tree`, keeping files selected by `path_filter` (all files when `None`).
pub fn walk(
    repo: &dyn RepoAccess,
    tree: &Tree,
    path_filter: Option<&str>,
    options: &WalkOptions,
) -> Result<WalkOutput> {
    let mut out = WalkOutput::default();

    for file in &tree.files {
        if let Some(filter) = path_filter {
            if !options.path_match.matches(&file.path, filter) {
                continue;
            }
        }

        let raw = repo.read_blob(file)?;
        let content = String::from_utf8_lossy(&raw).into_owned();

        let name = match path_filter {
            Some(_) => display_name(&file.path).to_string(),
            None => file.path.clone(),
        };
        let url = build_web_url(repo.location(), &tree.commit, path_filter, &name);

        let language = match language::classify(&file.path, &raw) {
            Some(lang) => {
                if !out.languages.iter().any(|l| l == lang) {
                    out.languages.push(lang.to_string());
                }
                lang.to_string()
            }
            None => {
                out.unknown_languages.push(file.path.clone());
                UNKNOWN_LANGUAGE.to_string()
            }
        };

        debug!(path = %file.path, language = %language, "walked file");
        out.files.push(FileEntry {
            config: is_config_file(&file.path),
            name,
            hash: file.blob_id.clone(),
            url,
            language,
            content,
            raw,
            ..FileEntry::default()
        });
        out.file_count += 1;
    }

    Ok(out)
}

/// Path with everything up to and including the first `/` removed.
pub fn display_name(path: &str) -> &str {
    match path.find('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Whether a file is a recognized configuration file.
pub fn is_config_file(path: &str) -> bool {
    FileFormat::detect(path).is_some()
        || CONFIG_MARKERS
            .iter()
            .any(|m| path == *m || path.contains(m))
}

/// Build a browsable URL: `<base>/blob/<rev>[/<filter>]/<name>`.
///
/// SSH remotes (`git@host:org/repo.git`) are rewritten to `https://host/org/repo`.
pub fn build_web_url(repo_url: &str, sha: &str, path_filter: Option<&str>, name: &str) -> String {
    let base = match repo_url.strip_prefix("git@") {
        Some(rest) => match rest.split_once(':') {
            Some((host, repo)) => format!("https://{}/{}", host, repo),
            None => repo_url.to_string(),
        },
        None => repo_url.to_string(),
    };
    let base = base.trim_end_matches('/').trim_end_matches(".git");

    match path_filter {
        Some(dir) => format!("{}/blob/{}/{}/{}", base, sha, dir.trim_matches('/'), name),
        None => format!("{}/blob/{}/{}", base, sha, name),
    }
}
