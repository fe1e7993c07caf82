//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("failed to parse config: {message}")]
    ParseFailed { message: String },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl crate::UserFacingError for ConfigError {
    fn user_message(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::ReadFailed { .. } => Some("config.read_failed"),
            Self::ParseFailed { .. } => Some("config.parse_failed"),
            Self::Invalid { .. } => Some("config.invalid"),
        }
    }
}
