//! Patch application and revert error types

use thiserror::Error;

/// A mutation error: one of the plan's filesystem commands exited non-zero.
///
/// The remaining plan is aborted; effects of already-applied operations stay
/// in place. Recovery is the unpatch workflow's job, never automatic.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PatchError {
    #[error("patch operation failed: {description}")]
    OperationFailed {
        description: String,
        diagnostic: String,
    },

    #[error("payload tree missing: {path}")]
    PayloadMissing { path: String },
}

impl crate::UserFacingError for PatchError {
    fn user_message(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::OperationFailed { .. } => {
                Some("The volume was left partially patched; run the unpatch workflow to recover.")
            }
            Self::PayloadMissing { .. } => {
                Some("Re-download the payload set and verify its directory layout.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::OperationFailed { .. } => Some("patch.operation_failed"),
            Self::PayloadMissing { .. } => Some("patch.payload_missing"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RevertError {
    #[error("no backup archives found; manual unpatch is unavailable")]
    NoBackups,

    #[error("failed to restore {directory}: {diagnostic}")]
    RestoreFailed {
        directory: String,
        diagnostic: String,
    },
}

impl crate::UserFacingError for RevertError {
    fn user_message(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoBackups => Some("Reinstall macOS to restore the original system volume."),
            Self::RestoreFailed { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::NoBackups => Some("revert.no_backups"),
            Self::RestoreFailed { .. } => Some("revert.restore_failed"),
        }
    }
}
