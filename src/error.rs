//! Errors raised while turning command flags into an action specification.

use std::path::PathBuf;
use thiserror::Error;

/// Rule violations. Each variant is one rule; the message is what the user sees.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cannot specify --web-secure without also specifying --web [true|raw]")]
    WebSecureWithoutWeb,
    #[error("Cannot specify sequence and a code artifact at the same time")]
    SequenceWithAction,
    #[error("Cannot specify sequence and a container image at the same time")]
    SequenceWithDocker,
    #[error("Cannot specify sequence and a native runtime at the same time")]
    SequenceWithNative,
    #[error("Cannot specify a kind and a container image at the same time")]
    KindWithDocker,
    #[error("Cannot specify a kind and a native runtime at the same time")]
    KindWithNative,
    #[error("A kind may not be specified for a sequence")]
    KindWithSequence,
    #[error("A kind can only be specified when you provide a code artifact")]
    KindWithoutAction,
    #[error("The function handler can only be specified when you provide a code artifact")]
    MainWithoutAction,
    #[error("Must provide a code artifact, container image, or a sequence")]
    MissingSource,
    #[error("Invalid argument(s). Creating an action from a zip/binary artifact requires specifying the action kind explicitly")]
    MissingKindForBinary,
    #[error("Provide a valid path for ACTION")]
    MissingAction,
    #[error("Cannot determine kind of action. Please use --kind to specify.")]
    UnknownKind,
    #[error("Provide a valid sequence component")]
    InvalidSequence,
    #[error("Invalid argument(s). Environment variables and function parameters may not overlap")]
    OverlappingParams,
}

#[derive(Error, Debug)]
pub enum SpecError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not UTF-8 text, use --binary to upload it as an archive")]
    NotText { path: PathBuf },

    #[error("invalid JSON in {path}: {source}")]
    ParamFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} must contain a JSON object")]
    ParamFileNotObject { path: PathBuf },

    #[error("Please provide correct values for flags")]
    UnpairedValues,
}

pub type SpecResult<T> = std::result::Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_pass_through() {
        let err: SpecError = ValidationError::UnknownKind.into();
        assert_eq!(err.to_string(), "Cannot determine kind of action. Please use --kind to specify.");
        assert!(matches!(err, SpecError::Validation(ValidationError::UnknownKind)));
    }
}
