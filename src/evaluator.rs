//! Policy evaluation seam.
//!
//! The filter engine only needs "does this policy produce anything for this
//! input", so evaluators report named values and drop everything that would
//! not count as a result.

use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::models::PolicyDocument;

/// A named value produced by a policy, e.g. `deny` with its messages.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: Value,
}

/// One result of an evaluation. Never empty when returned by an evaluator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub expressions: Vec<NamedValue>,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct EvalError(pub String);

pub trait PolicyEvaluator: Send + Sync {
    /// Evaluate `policy` against `input`. `module` names the compiled policy
    /// module (the rule name). An empty vector means the policy does not apply.
    fn evaluate(
        &self,
        policy: &PolicyDocument,
        module: &str,
        input: &Value,
    ) -> Result<Vec<ResultSet>, EvalError>;
}

/// [`PolicyEvaluator`] backed by the `regorus` Rego interpreter.
///
/// The whole `data` document is queried and the rules of the policy's own
/// package become named values, in rule-name order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegoEvaluator;

impl RegoEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyEvaluator for RegoEvaluator {
    fn evaluate(
        &self,
        policy: &PolicyDocument,
        module: &str,
        input: &Value,
    ) -> Result<Vec<ResultSet>, EvalError> {
        let package = package_path(&policy.content)
            .ok_or_else(|| EvalError(format!("policy {} declares no package", policy.name)))?;

        let mut engine = regorus::Engine::new();
        engine
            .add_policy(format!("{}.rego", module), policy.content.clone())
            .map_err(|e| EvalError(e.to_string()))?;

        let input_json = serde_json::to_string(input).map_err(|e| EvalError(e.to_string()))?;
        let input = regorus::Value::from_json_str(&input_json).map_err(|e| EvalError(e.to_string()))?;
        engine.set_input(input);

        let results = engine
            .eval_query("data".to_string(), false)
            .map_err(|e| EvalError(e.to_string()))?;

        let mut sets = Vec::new();
        for result in &results.result {
            for expr in &result.expressions {
                let data = serde_json::to_value(&expr.value).map_err(|e| EvalError(e.to_string()))?;
                let set = package_values(&data, &package);
                trace!(module = %module, named = set.expressions.len(), "evaluated expression");
                if !set.expressions.is_empty() {
                    sets.push(set);
                }
            }
        }
        Ok(sets)
    }
}

/// Segments of the first `package a.b.c` declaration.
fn package_path(rego: &str) -> Option<Vec<String>> {
    rego.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("package "))
        .and_then(|rest| rest.split_whitespace().next())
        .map(|path| {
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|segments| !segments.is_empty())
}

/// Significant rule values under `data.<package>`.
fn package_values(data: &Value, package: &[String]) -> ResultSet {
    let mut node = data;
    for segment in package {
        match node.get(segment) {
            Some(next) => node = next,
            None => return ResultSet::default(),
        }
    }

    let expressions = match node {
        Value::Object(rules) => rules
            .iter()
            .filter(|(_, v)| is_significant(v))
            .map(|(name, value)| NamedValue {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
        _ => Vec::new(),
    };
    ResultSet { expressions }
}

/// `null`, `false`, and empty collections count as "nothing produced".
fn is_significant(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Render result sets as `name: <json>` pairs joined with `; `.
pub fn summarize(sets: &[ResultSet]) -> String {
    sets.iter()
        .flat_map(|set| set.expressions.iter())
        .map(|nv| format!("{}: {}", nv.name, nv.value))
        .collect::<Vec<_>>()
        .join("; ")
}
