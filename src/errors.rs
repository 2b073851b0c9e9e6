//! Error types for voynich-roles.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum VoynichError {
    /// Configuration-related errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Corpus ingestion errors.
    #[error("corpus error: {0}")]
    Corpus(String),

    /// Embedding provider errors.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Clustering errors.
    #[error("cluster error: {0}")]
    Cluster(String),

    /// An upstream artifact this stage depends on does not exist.
    #[error("missing artifact {path}: run the `{producer}` stage first")]
    MissingArtifact {
        /// Expected location of the artifact.
        path: PathBuf,
        /// Stage that produces it.
        producer: &'static str,
    },

    /// An input changed after the artifact derived from it was written.
    #[error("stale artifact {path}: {reason}")]
    StaleArtifact {
        /// Artifact that no longer reflects its inputs.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },

    /// A single record could not be parsed.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// I/O error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// CSV read/write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Binary cache encoding error.
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, VoynichError>;
