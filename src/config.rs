use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::filter::compile_rules;
use crate::models::Rule;
use crate::policy::{DEFAULT_MARKER, DEFAULT_POLICY_PATH};
use crate::snapshot::RetrieveOptions;
use crate::walker::{PathMatch, WalkOptions};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub repositories: RepositoriesConfig,
    #[serde(default)]
    pub walk: WalkConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoriesConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Fetch before reusing an existing clone.
    #[serde(default)]
    pub fetch_on_open: bool,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            fetch_on_open: false,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("repositories")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WalkConfig {
    #[serde(default)]
    pub path_match: PathMatch,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    #[serde(default = "default_policy_path")]
    pub default_path: PathBuf,
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_path: default_policy_path(),
            marker: default_marker(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_policy_path() -> PathBuf {
    PathBuf::from(DEFAULT_POLICY_PATH)
}
fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub dedupe: bool,
}

impl Config {
    pub fn retrieve_options(&self) -> RetrieveOptions {
        RetrieveOptions {
            walk: WalkOptions {
                path_match: self.walk.path_match,
            },
            policy_marker: self.policy.marker.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.policy.fetch_timeout_secs == 0 {
        anyhow::bail!("policy.fetch_timeout_secs must be > 0");
    }

    if config.policy.marker.is_empty() {
        anyhow::bail!("policy.marker must not be empty");
    }

    validate_rules(&config.rules)
}

/// Every rule needs a name and a pattern that compiles.
pub fn validate_rules(rules: &[Rule]) -> Result<()> {
    if let Some(idx) = rules.iter().position(|r| r.name.trim().is_empty()) {
        anyhow::bail!("rules[{}].name must not be empty", idx);
    }
    compile_rules(rules)?;
    Ok(())
}

/// Load rules from a JSON file.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
    parse_rules(&content).with_context(|| format!("Failed to parse rules file: {}", path.display()))
}

/// Accepts `{"config": [...]}` (the filter form document) or a bare array.
pub fn parse_rules(text: &str) -> Result<Vec<Rule>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RulesDocument {
        Wrapped { config: Vec<Rule> },
        Bare(Vec<Rule>),
    }

    let rules = match serde_json::from_str::<RulesDocument>(text)? {
        RulesDocument::Wrapped { config } => config,
        RulesDocument::Bare(rules) => rules,
    };
    validate_rules(&rules)?;
    Ok(rules)
}
