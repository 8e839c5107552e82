use std::io;

use thiserror::Error;

/// Error type for corpus parsing, registry persistence, and file conversion failures.
#[derive(Debug, Error)]
pub enum WsdError {
    #[error("malformed line ({reason}): {line:?}")]
    MalformedLine { line: String, reason: &'static str },
    #[error("sense label {label:?} is not a positive integer class")]
    InvalidSense { label: String },
    #[error("invalid index file: {0}")]
    InvalidIndex(String),
    #[error("invalid ARFF file: {0}")]
    InvalidArff(String),
    #[error("invalid registry: {0}")]
    InvalidRegistry(String),
    #[error("configuration error: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, WsdError>;

impl WsdError {
    pub(crate) fn malformed(line: &str, reason: &'static str) -> Self {
        WsdError::MalformedLine {
            line: line.to_string(),
            reason,
        }
    }
}
