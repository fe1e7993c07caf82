use serde::{Deserialize, Serialize};

use rootpatch_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code when the error taxonomy provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether a fresh invocation after remediation makes sense.
    pub retryable: bool,
}

impl FailureContext {
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod backup;
pub mod gate;
pub mod general;
pub mod patch;
pub mod resolver;
pub mod seal;
pub mod stage;
pub mod volume;

pub use backup::BackupEvent;
pub use gate::GateEvent;
pub use general::GeneralEvent;
pub use patch::PatchEvent;
pub use resolver::ResolverEvent;
pub use seal::SealEvent;
pub use stage::StageEvent;
pub use volume::VolumeEvent;

/// Top-level application event enum aggregating all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Hardware/OS patch-set resolution events
    Resolver(ResolverEvent),

    /// Security gate evaluation events
    Gate(GateEvent),

    /// Root volume mount/unmount/seal-state events
    Volume(VolumeEvent),

    /// Backup creation and restore events
    Backup(BackupEvent),

    /// Patch plan execution events
    Patch(PatchEvent),

    /// Cache rebuild and snapshot sealing events
    Seal(SealEvent),

    /// Workflow stage transitions
    Stage(StageEvent),
}

impl AppEvent {
    /// Tracing level used when mirroring this event into the log stream.
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            Self::General(event) => event.log_level(),
            Self::Gate(GateEvent::BlockerFound { .. } | GateEvent::Blocked { .. }) => {
                tracing::Level::WARN
            }
            Self::Patch(PatchEvent::OperationSkipped { .. }) => tracing::Level::DEBUG,
            Self::Seal(SealEvent::SnapshotSkipped { .. }) => tracing::Level::WARN,
            _ => tracing::Level::INFO,
        }
    }
}
