//! Root volume discovery and mount error types
//!
//! These are environment errors: the operator is told to reboot and retry,
//! nothing is retried automatically.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VolumeError {
    #[error("could not find root volume device")]
    DeviceNotFound,

    #[error("unexpected root device identifier: {identifier}")]
    UnexpectedDevice { identifier: String },

    #[error("failed to mount root volume {device}: {output}")]
    MountFailed { device: String, output: String },

    #[error("root volume not visible at {mount_point} after mounting")]
    NotVisibleAfterMount { mount_point: String },
}

impl crate::UserFacingError for VolumeError {
    fn user_message(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some("Reboot the machine and try patching again.")
    }

    fn is_retryable(&self) -> bool {
        // Safe to retry after a reboot; never retried in-process.
        true
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::DeviceNotFound => Some("volume.device_not_found"),
            Self::UnexpectedDevice { .. } => Some("volume.unexpected_device"),
            Self::MountFailed { .. } => Some("volume.mount_failed"),
            Self::NotVisibleAfterMount { .. } => Some("volume.not_visible"),
        }
    }
}
