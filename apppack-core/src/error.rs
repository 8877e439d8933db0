//! Error taxonomy of the engine

use thiserror::Error;

use crate::flags::FlagError;
use crate::params::CodecError;
use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad or missing user input; never touches the provider
    #[error("{0}")]
    UserInput(String),

    /// A check that must hold before any mutation failed
    #[error("{0}")]
    Precondition(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The stack reached a failure or rollback status
    #[error("{stack} ended in {status}{}\n  {console_url}", .reason.as_ref().map(|r| format!(": {}", r)).unwrap_or_default())]
    StackFailure {
        stack: String,
        status: String,
        reason: Option<String>,
        console_url: String,
    },

    #[error("{0}")]
    DirectoryEmpty(String),

    #[error("aborting: {0}")]
    ConfirmationAborted(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Flag(#[from] FlagError),
}

impl EngineError {
    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::ConfirmationAborted(message.into())
    }

    /// Directory misses are preconditions from the user's point of view
    pub fn into_user_facing(self) -> Self {
        match self {
            EngineError::DirectoryEmpty(message) => EngineError::Precondition(message),
            other => other,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_failure_message() {
        let err = EngineError::StackFailure {
            stack: "apppack-app-x".to_string(),
            status: "ROLLBACK_COMPLETE".to_string(),
            reason: Some("Bucket already exists".to_string()),
            console_url: "https://console".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "apppack-app-x ended in ROLLBACK_COMPLETE: Bucket already exists\n  https://console"
        );
    }

    #[test]
    fn test_directory_empty_becomes_precondition() {
        let err = EngineError::DirectoryEmpty("no clusters".to_string()).into_user_facing();
        assert!(matches!(err, EngineError::Precondition(ref m) if m == "no clusters"));
    }
}
