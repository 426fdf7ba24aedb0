//! Policy documents: locating one in a snapshot, fetching one from a rule
//! URL, and falling back to the bundled default.
//!
//! Precedence, decided per rule: rule URL > snapshot policy > default policy.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, SnapshotError};
use crate::models::{PolicyDocument, Rule};
use crate::vcs::{RepoAccess, Tree};
use crate::walker::PathMatch;

/// File-name marker of in-repository policy files.
pub const DEFAULT_MARKER: &str = ".rego";

/// Default policy location, relative to the working directory.
pub const DEFAULT_POLICY_PATH: &str = "config/default.rego";

/// Find the first policy file (in tree order) among the files the walker
/// would keep for `path_filter`.
///
/// Nothing found is `Ok(None)`, not an error. Empty policy files are ignored.
pub fn locate(
    repo: &dyn RepoAccess,
    tree: &Tree,
    path_filter: Option<&str>,
    path_match: PathMatch,
    marker: &str,
) -> Result<Option<PolicyDocument>> {
    let candidate = tree.files.iter().find(|f| {
        let selected = path_filter.map_or(true, |filter| path_match.matches(&f.path, filter));
        selected && f.path.contains(marker)
    });

    let Some(file) = candidate else {
        return Ok(None);
    };

    let content = String::from_utf8_lossy(&repo.read_blob(file)?).into_owned();
    if content.is_empty() {
        debug!(path = %file.path, "ignoring empty policy file");
        return Ok(None);
    }

    info!(path = %file.path, "located snapshot policy");
    Ok(Some(PolicyDocument {
        name: file.path.clone(),
        content,
    }))
}

/// Retrieves policy text from a rule-level URL.
pub trait PolicyFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// [`PolicyFetcher`] over blocking HTTP.
pub struct HttpPolicyFetcher {
    client: reqwest::blocking::Client,
}

impl HttpPolicyFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| SnapshotError::PolicyResolution {
                source_name: "http client".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl PolicyFetcher for HttpPolicyFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let fetch_err = |message: String| SnapshotError::PolicyResolution {
            source_name: url.to_string(),
            message,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("unexpected status {}", status)));
        }

        let body = resp.text().map_err(|e| fetch_err(e.to_string()))?;
        if body.is_empty() {
            return Err(fetch_err("no bytes copied from response".to_string()));
        }
        Ok(body)
    }
}

/// Resolves the policy for each rule within one filter pass.
///
/// The default policy is read at most once per resolver.
pub struct PolicyResolver<'a> {
    fetcher: &'a dyn PolicyFetcher,
    default_path: PathBuf,
    default: Option<PolicyDocument>,
}

impl<'a> PolicyResolver<'a> {
    pub fn new(fetcher: &'a dyn PolicyFetcher, default_path: &Path) -> Self {
        Self {
            fetcher,
            default_path: default_path.to_path_buf(),
            default: None,
        }
    }

    /// Pick the policy for `rule`: its URL, else the snapshot's, else the default.
    pub fn resolve(
        &mut self,
        rule: &Rule,
        in_snapshot: Option<&PolicyDocument>,
    ) -> Result<PolicyDocument> {
        if !rule.policy_url.is_empty() {
            info!(rule = %rule.name, url = %rule.policy_url, "fetching rule policy");
            let content = self.fetcher.fetch(&rule.policy_url)?;
            return Ok(PolicyDocument {
                name: rule.policy_url.clone(),
                content,
            });
        }

        if let Some(doc) = in_snapshot {
            debug!(rule = %rule.name, policy = %doc.name, "using snapshot policy");
            return Ok(doc.clone());
        }

        if let Some(doc) = &self.default {
            return Ok(doc.clone());
        }
        debug!(rule = %rule.name, path = %self.default_path.display(), "reading default policy");
        let doc = read_default_policy(&self.default_path)?;
        self.default = Some(doc.clone());
        Ok(doc)
    }
}

/// Read the default policy. A missing or unreadable file is fatal.
pub fn read_default_policy(path: &Path) -> Result<PolicyDocument> {
    let content =
        std::fs::read_to_string(path).map_err(|e| SnapshotError::PolicyResolution {
            source_name: path.display().to_string(),
            message: format!("reading default policy file: {}", e),
        })?;
    Ok(PolicyDocument {
        name: path.display().to_string(),
        content,
    })
}
