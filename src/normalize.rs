//! Conversion of configuration files into canonical JSON values.
//!
//! Dispatch is a static suffix table onto [`FileFormat`]; every format has one
//! parser. Names without an entry are [`NormalizeError::Unsupported`], which
//! callers treat as "skip this file", never as a batch failure. Empty content
//! is [`NormalizeError::Empty`] even for supported formats.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unsupported file type: {name}")]
    Unsupported { name: String },

    #[error("no bytes read from file {name}")]
    Empty { name: String },

    #[error("reading file {name}: {message}")]
    Io { name: String, message: String },

    #[error("converting {name} from {format}: {message}")]
    Parse {
        name: String,
        format: &'static str,
        message: String,
    },
}

/// Every format the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Terraform,
    TerraformJson,
    Dockerfile,
    Toml,
    Properties,
}

/// Suffix → format, checked in order (longest suffixes first).
const SUFFIXES: &[(&str, FileFormat)] = &[
    (".tf.json", FileFormat::TerraformJson),
    (".json", FileFormat::Json),
    (".yaml", FileFormat::Yaml),
    (".yml", FileFormat::Yaml),
    (".tfvars", FileFormat::Terraform),
    (".tf", FileFormat::Terraform),
    (".hcl", FileFormat::Terraform),
    (".toml", FileFormat::Toml),
    (".properties", FileFormat::Properties),
    (".dockerfile", FileFormat::Dockerfile),
];

const DOCKERFILE_NAMES: &[&str] = &["Dockerfile", "dockerfile", "Containerfile"];

impl FileFormat {
    pub const ALL: [FileFormat; 7] = [
        FileFormat::Json,
        FileFormat::Yaml,
        FileFormat::Terraform,
        FileFormat::TerraformJson,
        FileFormat::Dockerfile,
        FileFormat::Toml,
        FileFormat::Properties,
    ];

    /// Format for a file name, or `None` when no normalizer handles it.
    pub fn detect(name: &str) -> Option<FileFormat> {
        let lower = name.to_ascii_lowercase();
        if let Some((_, format)) = SUFFIXES.iter().find(|(s, _)| lower.ends_with(s)) {
            return Some(*format);
        }

        let base = name.rsplit('/').next().unwrap_or(name);
        let is_dockerfile = DOCKERFILE_NAMES
            .iter()
            .any(|d| base == *d || base.starts_with(&format!("{}.", d)));
        is_dockerfile.then_some(FileFormat::Dockerfile)
    }

    pub fn label(self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Yaml => "yaml",
            FileFormat::Terraform => "hcl",
            FileFormat::TerraformJson => "terraform json",
            FileFormat::Dockerfile => "dockerfile",
            FileFormat::Toml => "toml",
            FileFormat::Properties => "properties",
        }
    }

    fn parse(self, text: &str) -> Result<Value, String> {
        match self {
            FileFormat::Json | FileFormat::TerraformJson => {
                serde_json::from_str(text).map_err(|e| e.to_string())
            }
            FileFormat::Yaml => parse_yaml(text),
            FileFormat::Terraform => hcl::from_str(text).map_err(|e| e.to_string()),
            FileFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            FileFormat::Properties => Ok(parse_properties(text)),
            FileFormat::Dockerfile => Ok(parse_dockerfile(text)),
        }
    }
}

/// Normalize `content` of the file `name` into a JSON value.
pub fn normalize(name: &str, content: &[u8]) -> Result<Value, NormalizeError> {
    let format = FileFormat::detect(name).ok_or_else(|| NormalizeError::Unsupported {
        name: name.to_string(),
    })?;

    if content.is_empty() {
        return Err(NormalizeError::Empty {
            name: name.to_string(),
        });
    }

    let parse_err = |message: String| NormalizeError::Parse {
        name: name.to_string(),
        format: format.label(),
        message,
    };

    let text = std::str::from_utf8(content).map_err(|e| parse_err(e.to_string()))?;
    format.parse(text).map_err(parse_err)
}

/// Like [`normalize`], draining `reader` first.
pub fn normalize_reader(name: &str, mut reader: impl Read) -> Result<Value, NormalizeError> {
    if FileFormat::detect(name).is_none() {
        return Err(NormalizeError::Unsupported {
            name: name.to_string(),
        });
    }
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| NormalizeError::Io {
            name: name.to_string(),
            message: e.to_string(),
        })?;
    normalize(name, &buf)
}

// ═══════════════════════════════════════════════════════════════════════
// YAML
// ═══════════════════════════════════════════════════════════════════════

/// One document becomes that document; several (`---`) become an array.
fn parse_yaml(text: &str) -> Result<Value, String> {
    let mut docs = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(doc).map_err(|e| e.to_string())?;
        docs.push(yaml_to_json(value)?);
    }

    if docs.len() > 1 {
        docs.retain(|d| !d.is_null());
    }
    Ok(match docs.len() {
        0 => Value::Null,
        1 => docs.remove(0),
        _ => Value::Array(docs),
    })
}

fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!(i)
            } else if let Some(u) = n.as_u64() {
                json!(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(n.to_string()))
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(seq) => Value::Array(
            seq.into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut out = Map::new();
            for (k, v) in mapping {
                out.insert(yaml_key(k)?, yaml_to_json(v)?);
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(format!("unsupported mapping key: {:?}", other)),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Java properties
// ═══════════════════════════════════════════════════════════════════════

fn parse_properties(text: &str) -> Value {
    let mut out = Map::new();
    let mut pending = String::new();

    for raw in text.lines() {
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        // An odd number of trailing backslashes continues the line.
        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            pending.push_str(&line[..line.len() - 1]);
            continue;
        }
        pending.push_str(line);

        let entry = std::mem::take(&mut pending);
        let split_at = entry.find(|c: char| c == '=' || c == ':' || c.is_whitespace());
        let (key, value) = match split_at {
            Some(idx) => {
                let value = entry[idx..]
                    .trim_start_matches(char::is_whitespace)
                    .trim_start_matches(['=', ':'])
                    .trim_start();
                (&entry[..idx], value)
            }
            None => (entry.as_str(), ""),
        };
        out.insert(key.to_string(), Value::String(value.to_string()));
    }

    if !pending.is_empty() {
        out.insert(pending, Value::String(String::new()));
    }
    Value::Object(out)
}

// ═══════════════════════════════════════════════════════════════════════
// Dockerfile
// ═══════════════════════════════════════════════════════════════════════

/// Parse a Dockerfile into instruction objects:
/// `{"cmd": "from", "flags": ["--platform=x"], "value": ["alpine", "AS", "base"], "stage": 0, "original": "..."}`.
fn parse_dockerfile(text: &str) -> Value {
    let mut instructions = Vec::new();
    let mut stage: i64 = 0;
    let mut froms_seen = 0usize;

    for original in logical_lines(text) {
        let (keyword, rest) = match original.split_once(char::is_whitespace) {
            Some((k, r)) => (k, r.trim()),
            None => (original.as_str(), ""),
        };
        let cmd = keyword.to_ascii_lowercase();

        if cmd == "from" {
            if froms_seen > 0 {
                stage += 1;
            }
            froms_seen += 1;
        }

        let mut flags = Vec::new();
        let mut rest = rest;
        while rest.starts_with("--") {
            let (flag, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            flags.push(flag.to_string());
            rest = tail.trim_start();
        }

        let value = instruction_value(&cmd, rest);
        instructions.push(json!({
            "cmd": cmd,
            "flags": flags,
            "value": value,
            "stage": stage,
            "original": original,
        }));
    }

    Value::Array(instructions)
}

/// Join `\`-continued lines and drop comments and blank lines.
fn logical_lines(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for raw in text.lines() {
        let line = raw.trim();
        // Blank lines inside a continuation do not end the instruction.
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(body) = line.strip_suffix('\\') {
            current.push_str(body.trim_end());
            current.push(' ');
            continue;
        }
        current.push_str(line);
        let joined = current.trim().to_string();
        current.clear();
        if !joined.is_empty() {
            out.push(joined);
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

fn instruction_value(cmd: &str, rest: &str) -> Vec<String> {
    if rest.starts_with('[') {
        if let Ok(exec) = serde_json::from_str::<Vec<String>>(rest) {
            return exec;
        }
    }

    match cmd {
        "run" | "cmd" | "entrypoint" | "shell" | "healthcheck" => {
            if rest.is_empty() {
                Vec::new()
            } else {
                vec![rest.to_string()]
            }
        }
        "env" | "label" => key_value_pairs(rest),
        _ => rest.split_whitespace().map(str::to_string).collect(),
    }
}

/// `ENV a=1 b="two words"` → `[a, 1, b, two words]`; legacy `ENV a 1 2` → `[a, 1 2]`.
fn key_value_pairs(rest: &str) -> Vec<String> {
    let words = split_words(rest);
    if words.first().map_or(true, |w| !w.contains('=')) {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let key = parts.next().unwrap_or_default().to_string();
        let value = parts.next().unwrap_or_default().trim().to_string();
        return vec![key, value];
    }

    words
        .into_iter()
        .flat_map(|w| match w.split_once('=') {
            Some((k, v)) => vec![k.to_string(), v.to_string()],
            None => vec![w.clone(), String::new()],
        })
        .collect()
}

/// Whitespace split that keeps quoted runs together and strips the quotes.
fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in s.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_format_has_a_route() {
        for format in FileFormat::ALL {
            let routed = SUFFIXES.iter().any(|(_, f)| *f == format)
                || format == FileFormat::Dockerfile;
            assert!(routed, "{:?} has no suffix entry", format);
        }
    }

    #[test]
    fn test_detect_by_suffix() {
        assert_eq!(FileFormat::detect("a/b.json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::detect("main.tf.json"), Some(FileFormat::TerraformJson));
        assert_eq!(FileFormat::detect("main.tf"), Some(FileFormat::Terraform));
        assert_eq!(FileFormat::detect("k8s/deploy.YML"), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::detect("svc/Dockerfile"), Some(FileFormat::Dockerfile));
        assert_eq!(FileFormat::detect("Dockerfile.dev"), Some(FileFormat::Dockerfile));
        assert_eq!(FileFormat::detect("app.xyz"), None);
        assert_eq!(FileFormat::detect("notes.json.bak"), None);
    }

    #[test]
    fn test_unsupported_wins_over_empty() {
        assert!(matches!(
            normalize("app.xyz", b""),
            Err(NormalizeError::Unsupported { .. })
        ));
        assert!(matches!(
            normalize("app.xyz", b"anything"),
            Err(NormalizeError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_empty_supported_file_is_an_error() {
        assert!(matches!(
            normalize("config.yaml", b""),
            Err(NormalizeError::Empty { .. })
        ));
    }

    #[test]
    fn test_json_passthrough() {
        let v = normalize("x.json", br#"{"a": [1, 2]}"#).unwrap();
        assert_eq!(v, json!({"a": [1, 2]}));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = normalize("x.json", b"{oops").unwrap_err();
        assert!(matches!(err, NormalizeError::Parse { format: "json", .. }));
    }

    #[test]
    fn test_yaml_single_document() {
        let v = normalize("deploy.yaml", b"kind: Deployment\nspec:\n  replicas: 3\n").unwrap();
        assert_eq!(v, json!({"kind": "Deployment", "spec": {"replicas": 3}}));
    }

    #[test]
    fn test_yaml_multi_document() {
        let text = b"---\nkind: Service\n---\nkind: Deployment\n";
        let v = normalize("all.yml", text).unwrap();
        assert_eq!(v, json!([{"kind": "Service"}, {"kind": "Deployment"}]));
    }

    #[test]
    fn test_yaml_non_string_keys() {
        let v = normalize("ports.yaml", b"80: http\ntrue: yes\n").unwrap();
        assert_eq!(v, json!({"80": "http", "true": "yes"}));
    }

    #[test]
    fn test_terraform() {
        let text = br#"
resource "aws_s3_bucket" "logs" {
  bucket = "my-logs"
  acl    = "private"
}
"#;
        let v = normalize("main.tf", text).unwrap();
        assert_eq!(
            v["resource"]["aws_s3_bucket"]["logs"]["bucket"],
            json!("my-logs")
        );
    }

    #[test]
    fn test_toml() {
        let v = normalize("Cargo.toml", b"[package]\nname = \"x\"\n").unwrap();
        assert_eq!(v, json!({"package": {"name": "x"}}));
    }

    #[test]
    fn test_properties() {
        let text = b"# comment\nversion=1.2\nname : demo\nlong = a \\\n  b\n";
        let v = normalize("gradle.properties", text).unwrap();
        assert_eq!(v["version"], json!("1.2"));
        assert_eq!(v["name"], json!("demo"));
        assert_eq!(v["long"], json!("a b"));
    }

    #[test]
    fn test_dockerfile_instructions() {
        let text = b"# base\nFROM --platform=linux/amd64 golang:1.22 AS build\n\
RUN go build \\\n    -o /app .\n\
FROM alpine:latest\n\
COPY --from=build /app /app\n\
ENV A=1 B=\"two words\"\n\
ENTRYPOINT [\"/app\", \"serve\"]\n";
        let v = normalize("Dockerfile", text).unwrap();
        let items = v.as_array().unwrap();
        assert_eq!(items.len(), 6);

        assert_eq!(items[0]["cmd"], json!("from"));
        assert_eq!(items[0]["flags"], json!(["--platform=linux/amd64"]));
        assert_eq!(items[0]["value"], json!(["golang:1.22", "AS", "build"]));
        assert_eq!(items[0]["stage"], json!(0));

        assert_eq!(items[1]["value"], json!(["go build -o /app ."]));
        assert_eq!(items[2]["stage"], json!(1));
        assert_eq!(items[3]["flags"], json!(["--from=build"]));
        assert_eq!(items[4]["value"], json!(["A", "1", "B", "two words"]));
        assert_eq!(items[5]["value"], json!(["/app", "serve"]));
    }

    #[test]
    fn test_blank_line_inside_continuation() {
        let text = b"FROM alpine:3.19\nRUN apk add \\\n\n    curl\nUSER app\n";
        let v = normalize("Dockerfile", text).unwrap();
        let cmds: Vec<&str> = v
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["cmd"].as_str().unwrap())
            .collect();
        assert_eq!(cmds, vec!["from", "run", "user"]);
        assert_eq!(v[1]["value"], json!(["apk add curl"]));
    }

    #[test]
    fn test_legacy_env_form() {
        assert_eq!(key_value_pairs("PATH /usr/bin /bin"), vec!["PATH", "/usr/bin /bin"]);
    }

    #[test]
    fn test_reader_variant() {
        let v = normalize_reader("x.json", std::io::Cursor::new(b"[1]".to_vec())).unwrap();
        assert_eq!(v, json!([1]));
    }
}
