//! Rule/policy filter engine.
//!
//! For every (file, rule) pair: name match → policy resolution →
//! normalization → evaluation → decision. Only an unsupported file format is
//! a skip; every other failure aborts the pass. The source snapshot is never
//! modified; kept files are copied into a new one.

use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, SnapshotError};
use crate::evaluator::{self, PolicyEvaluator, RegoEvaluator};
use crate::models::{FileEntry, PolicyDocument, RepositorySnapshot, Rule};
use crate::normalize::{self, NormalizeError};
use crate::policy::{HttpPolicyFetcher, PolicyFetcher, PolicyResolver};
use crate::session::SessionStore;

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Keep a file only for the first rule that keeps it.
    pub dedupe: bool,
}

pub struct FilterEngine {
    evaluator: Box<dyn PolicyEvaluator>,
    fetcher: Box<dyn PolicyFetcher>,
    default_policy_path: PathBuf,
    options: FilterOptions,
}

impl FilterEngine {
    pub fn new(
        evaluator: Box<dyn PolicyEvaluator>,
        fetcher: Box<dyn PolicyFetcher>,
        default_policy_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            evaluator,
            fetcher,
            default_policy_path: default_policy_path.into(),
            options: FilterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FilterOptions) -> Self {
        self.options = options;
        self
    }

    /// Rego evaluation, HTTP policy fetching, and the configured default policy.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher =
            HttpPolicyFetcher::new(Duration::from_secs(config.policy.fetch_timeout_secs))?;
        Ok(Self::new(
            Box::new(RegoEvaluator::new()),
            Box::new(fetcher),
            config.policy.default_path.clone(),
        )
        .with_options(FilterOptions {
            dedupe: config.filter.dedupe,
        }))
    }

    /// Derive a snapshot holding the files some rule's policy keeps.
    pub fn filter(&self, snapshot: &RepositorySnapshot, rules: &[Rule]) -> Result<RepositorySnapshot> {
        let patterns = compile_rules(rules)?;
        let mut resolver = PolicyResolver::new(self.fetcher.as_ref(), &self.default_policy_path);
        let mut policies: Vec<Option<PolicyDocument>> = vec![None; rules.len()];

        let mut kept = Vec::new();
        for entry in &snapshot.files {
            let mut input: Option<Option<serde_json::Value>> = None;

            for (idx, (rule, pattern)) in rules.iter().zip(&patterns).enumerate() {
                if !pattern.is_match(&entry.name) {
                    continue;
                }

                let policy = match policies[idx] {
                    Some(ref policy) => policy,
                    None => {
                        let resolved = resolver.resolve(rule, snapshot.policy.as_ref())?;
                        &*policies[idx].insert(resolved)
                    }
                };

                if input.is_none() {
                    input = Some(normalized_input(entry)?);
                }
                let Some(Some(value)) = input.as_ref() else {
                    debug!(file = %entry.name, rule = %rule.name, "unsupported format, skipping");
                    continue;
                };

                let sets = self
                    .evaluator
                    .evaluate(policy, &rule.name, value)
                    .map_err(|e| SnapshotError::PolicyEvaluation {
                        rule: rule.name.clone(),
                        name: entry.name.clone(),
                        message: e.to_string(),
                    })?;
                if sets.is_empty() {
                    debug!(file = %entry.name, rule = %rule.name, "policy produced no result");
                    continue;
                }

                info!(file = %entry.name, rule = %rule.name, policy = %policy.name, "keeping file");
                kept.push(FileEntry {
                    kind: rule.name.clone(),
                    applied_policy: policy.name.clone(),
                    output_policy: evaluator::summarize(&sets),
                    ..entry.clone()
                });
                if self.options.dedupe {
                    break;
                }
            }
        }

        Ok(RepositorySnapshot {
            base_url: snapshot.base_url.clone(),
            base_hash: snapshot.base_hash.clone(),
            base_dir: snapshot.base_dir.clone(),
            file_count: snapshot.file_count,
            languages: snapshot.languages.clone(),
            unknown_languages: snapshot.unknown_languages.clone(),
            policy: snapshot.policy.clone(),
            files: kept,
        })
    }

    /// Filter the snapshot stored under `session_id` and record the result there.
    pub fn filter_session(
        &self,
        store: &SessionStore,
        session_id: &str,
        rules: &[Rule],
    ) -> Result<Arc<RepositorySnapshot>> {
        let source = store.snapshot(session_id)?;
        let filtered = self.filter(&source, rules)?;
        store.record_filtered(session_id, filtered)
    }
}

/// Compile every rule pattern before any file is touched.
pub fn compile_rules(rules: &[Rule]) -> Result<Vec<Regex>> {
    rules
        .iter()
        .map(|rule| {
            Regex::new(&rule.filter).map_err(|source| SnapshotError::InvalidRule {
                rule: rule.name.clone(),
                pattern: rule.filter.clone(),
                source,
            })
        })
        .collect()
}

/// `Ok(None)` for an unsupported format; every other failure is fatal.
fn normalized_input(entry: &FileEntry) -> Result<Option<serde_json::Value>> {
    match normalize::normalize_reader(&entry.name, entry.reader()) {
        Ok(value) => Ok(Some(value)),
        Err(NormalizeError::Unsupported { .. }) => Ok(None),
        Err(NormalizeError::Empty { name }) => Err(SnapshotError::EmptyContent { name }),
        Err(NormalizeError::Io { name, message }) => {
            Err(SnapshotError::TreeRead { path: name, message })
        }
        Err(NormalizeError::Parse {
            name,
            format,
            message,
        }) => Err(SnapshotError::Normalization {
            name,
            format,
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EvalError, NamedValue, ResultSet};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Produces one `match` value for every input.
    struct AlwaysMatch;

    impl PolicyEvaluator for AlwaysMatch {
        fn evaluate(
            &self,
            _policy: &PolicyDocument,
            _module: &str,
            _input: &Value,
        ) -> std::result::Result<Vec<ResultSet>, EvalError> {
            Ok(vec![ResultSet {
                expressions: vec![NamedValue {
                    name: "match".to_string(),
                    value: json!(true),
                }],
            }])
        }
    }

    struct NeverMatch;

    impl PolicyEvaluator for NeverMatch {
        fn evaluate(
            &self,
            _policy: &PolicyDocument,
            _module: &str,
            _input: &Value,
        ) -> std::result::Result<Vec<ResultSet>, EvalError> {
            Ok(Vec::new())
        }
    }

    struct Broken;

    impl PolicyEvaluator for Broken {
        fn evaluate(
            &self,
            _policy: &PolicyDocument,
            _module: &str,
            _input: &Value,
        ) -> std::result::Result<Vec<ResultSet>, EvalError> {
            Err(EvalError("rego_parse_error".to_string()))
        }
    }

    #[derive(Default)]
    struct StubFetcher {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl PolicyFetcher for StubFetcher {
        fn fetch(&self, url: &str) -> Result<String> {
            self.calls.lock().unwrap().push(url.to_string());
            Ok("package remote".to_string())
        }
    }

    fn entry(name: &str, content: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            content: content.to_string(),
            raw: content.as_bytes().to_vec(),
            language: "Unknown".to_string(),
            ..FileEntry::default()
        }
    }

    fn snapshot(files: Vec<FileEntry>) -> RepositorySnapshot {
        RepositorySnapshot {
            base_url: "https://example.com/org/app".to_string(),
            base_hash: "a".repeat(40),
            base_dir: "/".to_string(),
            file_count: files.len(),
            languages: vec!["Go".to_string()],
            files,
            ..RepositorySnapshot::default()
        }
    }

    fn scenario() -> RepositorySnapshot {
        snapshot(vec![
            entry("Dockerfile", "FROM alpine:3.19\nRUN apk add curl\n"),
            entry("main.go", "package main\n"),
            entry("deploy.tf", "resource \"aws_s3_bucket\" \"b\" {\n  bucket = \"b\"\n}\n"),
        ])
    }

    fn engine_with(evaluator: Box<dyn PolicyEvaluator>) -> (FilterEngine, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("default.rego");
        std::fs::write(&path, "package default_policy\n").unwrap();
        let engine = FilterEngine::new(evaluator, Box::new(StubFetcher::default()), path);
        (engine, dir)
    }

    #[test]
    fn test_end_to_end_docker_rule() {
        let (engine, dir) = engine_with(Box::new(AlwaysMatch));
        let rules = vec![Rule::new("Docker", "Dockerfile", "")];

        let out = engine.filter(&scenario(), &rules).unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.files[0].name, "Dockerfile");
        assert_eq!(out.files[0].kind, "Docker");
        assert_eq!(out.files[0].output_policy, "match: true");
        assert_eq!(
            out.files[0].applied_policy,
            dir.path().join("default.rego").display().to_string()
        );
        assert_eq!(out.file_count, 3);
        assert_eq!(out.languages, vec!["Go"]);
        assert_eq!(out.base_hash, "a".repeat(40));
    }

    #[test]
    fn test_source_snapshot_untouched() {
        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let source = scenario();
        engine
            .filter(&source, &[Rule::new("Docker", "Dockerfile", "")])
            .unwrap();
        assert_eq!(source.files.len(), 3);
        assert!(source.files.iter().all(|f| f.kind.is_empty()));
    }

    #[test]
    fn test_rule_url_recorded_over_repo_policy() {
        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let mut source = scenario();
        source.policy = Some(PolicyDocument {
            name: "policy/local.rego".to_string(),
            content: "package local".to_string(),
        });
        let rules = vec![
            Rule::new("Remote", "Dockerfile", "https://policies.example.com/docker.rego"),
            Rule::new("Local", "deploy", ""),
        ];

        let out = engine.filter(&source, &rules).unwrap();
        assert_eq!(out.files.len(), 2);
        assert_eq!(
            out.files[0].applied_policy,
            "https://policies.example.com/docker.rego"
        );
        assert_eq!(out.files[1].applied_policy, "policy/local.rego");
    }

    #[test]
    fn test_unsupported_format_is_skipped() {
        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let source = snapshot(vec![entry("app.xyz", "whatever"), entry("app.json", "{}")]);

        let out = engine.filter(&source, &[Rule::new("App", "app", "")]).unwrap();
        let names: Vec<&str> = out.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["app.json"]);
    }

    #[test]
    fn test_empty_supported_file_aborts() {
        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let source = snapshot(vec![entry("empty.yaml", "")]);
        let err = engine
            .filter(&source, &[Rule::new("Yaml", "yaml", "")])
            .unwrap_err();
        assert!(matches!(err, SnapshotError::EmptyContent { .. }));
    }

    #[test]
    fn test_parse_failure_aborts() {
        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let source = snapshot(vec![entry("bad.json", "{ nope")]);
        let err = engine
            .filter(&source, &[Rule::new("Json", "json", "")])
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Normalization { format: "json", .. }));
    }

    #[test]
    fn test_evaluation_failure_aborts() {
        let (engine, _dir) = engine_with(Box::new(Broken));
        let err = engine
            .filter(&scenario(), &[Rule::new("Docker", "Dockerfile", "")])
            .unwrap_err();
        assert!(
            matches!(err, SnapshotError::PolicyEvaluation { ref rule, ref name, .. } if rule == "Docker" && name == "Dockerfile")
        );
    }

    #[test]
    fn test_empty_result_drops_file() {
        let (engine, _dir) = engine_with(Box::new(NeverMatch));
        let out = engine
            .filter(&scenario(), &[Rule::new("Docker", "Dockerfile", "")])
            .unwrap();
        assert!(out.files.is_empty());
    }

    #[test]
    fn test_duplicates_across_rules() {
        let rules = vec![
            Rule::new("Docker", "Dockerfile", ""),
            Rule::new("Container", "^Docker", ""),
        ];

        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let out = engine.filter(&scenario(), &rules).unwrap();
        let kinds: Vec<&str> = out.files.iter().map(|f| f.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Docker", "Container"]);

        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let engine = engine.with_options(FilterOptions { dedupe: true });
        let out = engine.filter(&scenario(), &rules).unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.files[0].kind, "Docker");
    }

    #[test]
    fn test_filter_is_deterministic() {
        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let rules = vec![Rule::new("Any", ".", "")];
        let source = scenario();
        let first = engine.filter(&source, &rules).unwrap();
        let second = engine.filter(&source, &rules).unwrap();
        let names = |s: &RepositorySnapshot| {
            s.files
                .iter()
                .map(|f| (f.name.clone(), f.kind.clone(), f.output_policy.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.files.len(), 2);
    }

    #[test]
    fn test_unmatched_rule_never_fetches() {
        let fetcher = StubFetcher::default();
        let calls = Arc::clone(&fetcher.calls);
        let engine = FilterEngine::new(
            Box::new(AlwaysMatch),
            Box::new(fetcher),
            "/nonexistent/default.rego",
        );
        let rules = vec![Rule::new("Nothing", "^no-such-file$", "https://example.com/p.rego")];
        let out = engine.filter(&scenario(), &rules).unwrap();
        assert!(out.files.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rule_policy_fetched_once() {
        let fetcher = StubFetcher::default();
        let calls = Arc::clone(&fetcher.calls);
        let engine = FilterEngine::new(
            Box::new(AlwaysMatch),
            Box::new(fetcher),
            "/nonexistent/default.rego",
        );
        let source = snapshot(vec![entry("a.json", "{}"), entry("b.json", "[]")]);
        let rules = vec![Rule::new("Json", "json", "https://example.com/p.rego")];
        let out = engine.filter(&source, &rules).unwrap();
        assert_eq!(out.files.len(), 2);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_default_policy_aborts() {
        let engine = FilterEngine::new(
            Box::new(AlwaysMatch),
            Box::new(StubFetcher::default()),
            "/nonexistent/default.rego",
        );
        let err = engine
            .filter(&scenario(), &[Rule::new("Docker", "Dockerfile", "")])
            .unwrap_err();
        assert!(matches!(err, SnapshotError::PolicyResolution { .. }));
    }

    #[test]
    fn test_invalid_pattern_rejected_up_front() {
        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let err = engine
            .filter(&scenario(), &[Rule::new("Bad", "(unclosed", "")])
            .unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidRule { .. }));
    }

    #[test]
    fn test_filter_session_records_result() {
        let (engine, _dir) = engine_with(Box::new(AlwaysMatch));
        let store = SessionStore::new();
        store.insert("s1", scenario());

        let out = engine
            .filter_session(&store, "s1", &[Rule::new("Docker", "Dockerfile", "")])
            .unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(store.filtered("s1").unwrap().unwrap().files.len(), 1);

        let err = engine.filter_session(&store, "missing", &[]).unwrap_err();
        assert!(matches!(err, SnapshotError::SessionNotFound(_)));
    }
}
