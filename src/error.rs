// src/error.rs
// Error taxonomy for the pipeline. Per-record malformation is never an error
// here -- it's counted in PipelineStats and logged, not propagated. These
// variants are reserved for failures that abort the run they occur in.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress {path}: {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("columnar shard {path} is missing required columns: {columns:?}")]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("no builder registered under '{name}' (known: {known:?})")]
    UnknownBuilder { name: String, known: Vec<String> },

    #[error("builder '{name}' is already registered")]
    DuplicateBuilderRegistration { name: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
