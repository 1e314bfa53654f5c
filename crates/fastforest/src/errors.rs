//! Error types for forest construction, persistence and evaluation

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`ForestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: missing files, malformed text, truncated binaries.
    Input,
    /// The input was readable but describes an inconsistent forest.
    CorruptModel,
    /// The caller asked for something the forest cannot do.
    Usage,
}

/// Errors that can occur while building, loading or evaluating a forest
#[derive(Error, Debug)]
pub enum ForestError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model file does not exist
    #[error("model file does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A line of the text dump could not be interpreted
    #[error("malformed text dump at line {line}: {message}")]
    MalformedLine { line: usize, message: String },

    /// Feature name not present in a fixed feature schema
    #[error("feature `{name}` at line {line} is not in the list of features")]
    UnknownFeature { name: String, line: usize },

    /// The dump never carried an `xgboost_version=` line
    #[error("text dump has no `xgboost_version=` line; refusing to guess the producer conventions")]
    MissingVersion,

    /// Class count outside the supported range
    #[error("invalid number of classes: {0} (must be at least 2)")]
    InvalidClassCount(usize),

    /// Binary input ended before the sizes announced by its header
    #[error("truncated forest binary: needed {expected} bytes, only {actual} available")]
    Truncated { expected: usize, actual: usize },

    /// Binary input is not a forest encoding
    #[error("malformed forest binary: {0}")]
    MalformedBinary(String),

    /// Structural invariant violation
    #[error("corrupt model: {0}")]
    CorruptModel(String),

    /// API misuse detected before any computation
    #[error("usage error: {0}")]
    Usage(String),

    /// Checked evaluation received a feature vector that is too short
    #[error("feature vector too short: forest reads index {}, got {actual} values", .required - 1)]
    FeatureVectorTooShort { required: usize, actual: usize },

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but holds unusable values
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ForestError {
    /// Place this error in the input / corrupt-model / usage taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForestError::Io(_)
            | ForestError::FileNotFound(_)
            | ForestError::MalformedLine { .. }
            | ForestError::UnknownFeature { .. }
            | ForestError::MissingVersion
            | ForestError::Truncated { .. }
            | ForestError::MalformedBinary(_)
            | ForestError::Config(_)
            | ForestError::InvalidConfig(_) => ErrorKind::Input,
            ForestError::CorruptModel(_) => ErrorKind::CorruptModel,
            ForestError::InvalidClassCount(_)
            | ForestError::Usage(_)
            | ForestError::FeatureVectorTooShort { .. } => ErrorKind::Usage,
        }
    }

    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        ForestError::MalformedLine {
            line,
            message: message.into(),
        }
    }
}

/// Result type for forest operations
pub type Result<T> = std::result::Result<T, ForestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(ForestError::MissingVersion.kind(), ErrorKind::Input);
        assert_eq!(
            ForestError::Truncated { expected: 12, actual: 4 }.kind(),
            ErrorKind::Input
        );
        assert_eq!(
            ForestError::CorruptModel("x".into()).kind(),
            ErrorKind::CorruptModel
        );
        assert_eq!(ForestError::Usage("x".into()).kind(), ErrorKind::Usage);
    }

    #[test]
    fn too_short_message_names_highest_index() {
        let err = ForestError::FeatureVectorTooShort { required: 5, actual: 3 };
        assert_eq!(
            err.to_string(),
            "feature vector too short: forest reads index 4, got 3 values"
        );
    }
}
