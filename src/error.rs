//! Error taxonomy for snapshot retrieval and policy filtering.
//!
//! Nearly every failure aborts the enclosing operation. The one exception is
//! an unsupported file format during filtering, which the filter engine turns
//! into a skip before it ever becomes a [`SnapshotError`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("({op}): repository {location}: {message}")]
    RepositoryAccess {
        op: &'static str,
        location: String,
        message: String,
    },

    #[error("(snapshot.resolve): revision '{revision}' in {location}: {message}")]
    RevisionResolution {
        location: String,
        revision: String,
        message: String,
    },

    #[error("(snapshot.walk): reading {path}: {message}")]
    TreeRead { path: String, message: String },

    #[error("(normalize): unsupported file type: {name}")]
    UnsupportedFormat { name: String },

    #[error("(filter): no bytes read from file {name}")]
    EmptyContent { name: String },

    #[error("(filter): converting {name} from {format}: {message}")]
    Normalization {
        name: String,
        format: &'static str,
        message: String,
    },

    #[error("(filter): retrieving policy from {source_name}: {message}")]
    PolicyResolution { source_name: String, message: String },

    #[error("(filter): evaluating rule '{rule}' on {name}: {message}")]
    PolicyEvaluation {
        rule: String,
        name: String,
        message: String,
    },

    #[error("(export): encoding snapshot: {0}")]
    Serialization(String),

    #[error("(filter): invalid '{rule}' pattern '{pattern}': {source}")]
    InvalidRule {
        rule: String,
        pattern: String,
        source: regex::Error,
    },

    #[error("(session): no snapshot stored for session '{0}'")]
    SessionNotFound(String),
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        SnapshotError::Serialization(e.to_string())
    }
}
