//! Export a snapshot as the portable JSON interchange document.
//!
//! Only caller-relevant fields are written: blob hashes, browsable URLs, the
//! config flag and raw bytes stay internal.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, SnapshotError};
use crate::models::RepositorySnapshot;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportDocument {
    pub file_count: usize,
    pub file_extensions: Vec<String>,
    pub unknown_file_extensions: Vec<String>,
    pub file: Vec<ExportFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportFile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Detected language label.
    pub extension: String,
    pub content: String,
    pub output_policy: String,
    pub applied_policy: String,
}

impl From<&RepositorySnapshot> for ExportDocument {
    fn from(snapshot: &RepositorySnapshot) -> Self {
        Self {
            file_count: snapshot.file_count,
            file_extensions: snapshot.languages.clone(),
            unknown_file_extensions: snapshot.unknown_languages.clone(),
            file: snapshot
                .files
                .iter()
                .map(|f| ExportFile {
                    name: f.name.clone(),
                    kind: f.kind.clone(),
                    extension: f.language.clone(),
                    content: f.content.clone(),
                    output_policy: f.output_policy.clone(),
                    applied_policy: f.applied_policy.clone(),
                })
                .collect(),
        }
    }
}

/// Encode `snapshot` as pretty-printed JSON.
pub fn to_json_bytes(snapshot: &RepositorySnapshot) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&ExportDocument::from(snapshot))?)
}

/// Encode `snapshot` into `writer`. Nothing is written if encoding fails.
pub fn write_json(snapshot: &RepositorySnapshot, mut writer: impl Write) -> Result<()> {
    let bytes = to_json_bytes(snapshot)?;
    writer
        .write_all(&bytes)
        .and_then(|_| writer.write_all(b"\n"))
        .map_err(|e| SnapshotError::Serialization(e.to_string()))
}

/// Write `snapshot` to `output`.
///
/// A directory (existing, or a path ending in `/`) receives a generated
/// `<uuid>.json` file; anything else is used as the file path.
pub fn export_to_path(snapshot: &RepositorySnapshot, output: &Path) -> Result<PathBuf> {
    let is_dir = output.is_dir() || output.as_os_str().to_string_lossy().ends_with('/');
    let path = if is_dir {
        output.join(format!("{}.json", uuid::Uuid::new_v4()))
    } else {
        output.to_path_buf()
    };

    let bytes = to_json_bytes(snapshot)?;
    let io_err = |e: std::io::Error| {
        SnapshotError::Serialization(format!("writing {}: {}", path.display(), e))
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    std::fs::write(&path, &bytes).map_err(io_err)?;

    info!(
        files = snapshot.files.len(),
        path = %path.display(),
        "exported snapshot"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileEntry;

    fn sample() -> RepositorySnapshot {
        RepositorySnapshot {
            base_url: "https://example.com/org/app".to_string(),
            base_hash: "f".repeat(40),
            base_dir: "/".to_string(),
            file_count: 2,
            languages: vec!["Dockerfile".to_string()],
            unknown_languages: vec!["main.churs".to_string()],
            policy: None,
            files: vec![FileEntry {
                name: "Dockerfile".to_string(),
                hash: "abc".to_string(),
                url: "https://example.com/org/app/blob/x/Dockerfile".to_string(),
                config: true,
                language: "Dockerfile".to_string(),
                kind: "Docker".to_string(),
                output_policy: "deny: [\"latest\"]".to_string(),
                applied_policy: "config/default.rego".to_string(),
                content: "FROM alpine:latest\n".to_string(),
                raw: b"FROM alpine:latest\n".to_vec(),
            }],
        }
    }

    #[test]
    fn test_export_round_trip() {
        let bytes = to_json_bytes(&sample()).unwrap();
        let doc: ExportDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc.file_count, 2);
        assert_eq!(doc.file_extensions, vec!["Dockerfile"]);
        assert_eq!(doc.unknown_file_extensions, vec!["main.churs"]);
        assert_eq!(doc.file[0].name, "Dockerfile");
        assert_eq!(doc.file[0].kind, "Docker");
        assert_eq!(doc.file[0].extension, "Dockerfile");
        assert_eq!(doc.file[0].content, "FROM alpine:latest\n");
    }

    #[test]
    fn test_internal_fields_not_serialized() {
        let value: serde_json::Value =
            serde_json::from_slice(&to_json_bytes(&sample()).unwrap()).unwrap();
        let file = value["file"][0].as_object().unwrap();
        let mut keys: Vec<&str> = file.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["applied_policy", "content", "extension", "name", "output_policy", "type"]
        );
        assert!(value.get("base_hash").is_none());
    }

    #[test]
    fn test_empty_snapshot_still_encodes() {
        let bytes = to_json_bytes(&RepositorySnapshot::default()).unwrap();
        let doc: ExportDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc.file_count, 0);
        assert!(doc.file.is_empty());
    }

    #[test]
    fn test_export_to_directory_generates_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = export_to_path(&sample(), dir.path()).unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert_eq!(path.extension().unwrap(), "json");
        let doc: ExportDocument =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc.file.len(), 1);
    }

    #[test]
    fn test_export_to_file_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("out/snapshot.json");
        let path = export_to_path(&sample(), &target).unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
    }
}
