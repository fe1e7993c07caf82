#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the rootpatch system patcher
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone where possible for easier handling.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod gate;
pub mod ops;
pub mod patch;
pub mod platform;
pub mod seal;
pub mod volume;

// Re-export all error types at the root
pub use config::ConfigError;
pub use gate::GateError;
pub use ops::OpsError;
pub use patch::{PatchError, RevertError};
pub use platform::PlatformError;
pub use seal::SealError;
pub use volume::VolumeError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("security gate error: {0}")]
    Gate(#[from] GateError),

    #[error("volume error: {0}")]
    Volume(#[from] VolumeError),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("revert error: {0}")]
    Revert(#[from] RevertError),

    #[error("seal error: {0}")]
    Seal(#[from] SealError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("ops error: {0}")]
    Ops(#[from] OpsError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[cfg_attr(feature = "serde", serde(skip))]
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

/// Result type alias for rootpatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether a fresh invocation (after remediation) makes sense.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Volume(err) => err.user_message(),
            Error::Seal(err) => err.user_message(),
            Error::Patch(err) => err.user_message(),
            Error::Revert(err) => err.user_message(),
            Error::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Volume(err) => err.user_hint(),
            Error::Seal(err) => err.user_hint(),
            Error::Patch(err) => err.user_hint(),
            Error::Config(_) => Some("Check your rootpatch configuration file."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        // Nothing here is retried automatically; every retry is a fresh
        // invocation by the operator after remediating the reported state.
        match self {
            Error::Volume(err) => err.is_retryable(),
            Error::Seal(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Config(err) => err.user_code(),
            Error::Gate(err) => err.user_code(),
            Error::Volume(err) => err.user_code(),
            Error::Patch(err) => err.user_code(),
            Error::Revert(err) => err.user_code(),
            Error::Seal(err) => err.user_code(),
            Error::Platform(err) => err.user_code(),
            Error::Ops(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}
