//! External tool invocation error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlatformError {
    #[error("failed to execute {command}: {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("unexpected output from {command}: {message}")]
    UnexpectedOutput { command: String, message: String },
}

impl crate::UserFacingError for PlatformError {
    fn user_message(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::ProcessExecutionFailed { .. } => Some("platform.exec_failed"),
            Self::CommandNotFound { .. } => Some("platform.command_not_found"),
            Self::UnexpectedOutput { .. } => Some("platform.unexpected_output"),
        }
    }
}
