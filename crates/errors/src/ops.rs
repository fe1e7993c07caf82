//! Orchestration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpsError {
    #[error("missing component: {component}")]
    MissingComponent { component: String },

    #[error("hardware profile error: {message}")]
    HardwareProfile { message: String },
}

impl crate::UserFacingError for OpsError {
    fn user_message(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::MissingComponent { .. } => Some("ops.missing_component"),
            Self::HardwareProfile { .. } => Some("ops.hardware_profile"),
        }
    }
}
