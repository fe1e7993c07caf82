//! Cache rebuild and snapshot sealing error types
//!
//! Both variants are recognized safe-but-incomplete terminal states: the
//! volume is intentionally left mounted and unsealed for manual follow-up.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SealError {
    #[error("kernel cache rebuild failed")]
    CacheRebuildFailed { diagnostic: String },

    #[error("sealed snapshot creation failed")]
    SnapshotCreationFailed {
        diagnostic: String,
        /// The known APFS bug signature was present in the bless output.
        apfs_bug: bool,
    },
}

impl crate::UserFacingError for SealError {
    fn user_message(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::CacheRebuildFailed { diagnostic } => {
                std::borrow::Cow::Owned(format!("kernel cache rebuild failed:\n{diagnostic}"))
            }
            Self::SnapshotCreationFailed { diagnostic, .. } => {
                std::borrow::Cow::Owned(format!("snapshot creation failed:\n{diagnostic}"))
            }
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CacheRebuildFailed { .. } => {
                Some("Reboot the machine before rerunning the patcher.")
            }
            Self::SnapshotCreationFailed { apfs_bug: true, .. } => Some(
                "This is a known APFS bug; perform a clean install to rebuild the volume layout.",
            ),
            Self::SnapshotCreationFailed { .. } => {
                Some("The volume was left mounted and unsealed for inspection.")
            }
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::CacheRebuildFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::CacheRebuildFailed { .. } => Some("seal.cache_rebuild_failed"),
            Self::SnapshotCreationFailed { .. } => Some("seal.snapshot_failed"),
        }
    }
}
