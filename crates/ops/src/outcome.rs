//! Terminal workflow states

use rootpatch_guard::Blocker;
use rootpatch_types::DirectoryRevert;
use serde::{Deserialize, Serialize};

/// How a patch run ended.
///
/// Only `Success` leaves the machine ready to reboot into the patched
/// volume. `PatchFailed` and `SealFailed` leave the volume partially
/// modified or unsealed; the unpatch workflow recovers from both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PatchOutcome {
    /// Nothing on this machine needs patching on this OS.
    NoPatchNeeded,
    Blocked { blockers: Vec<Blocker> },
    MountFailed { detail: String },
    PatchFailed { operation: String, diagnostic: String },
    SealFailed { diagnostic: String },
    Success,
}

/// How an unpatch run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnpatchOutcome {
    Blocked { blockers: Vec<Blocker> },
    MountFailed { detail: String },
    /// The firmware restored the last factory-sealed snapshot.
    RevertedNatively,
    /// Directories restored one by one from the backup archives.
    RevertedManually { reverts: Vec<DirectoryRevert> },
    /// No sealed snapshot to fall back to and no backup archives either.
    RevertUnavailable,
    SealFailed { diagnostic: String },
}

impl PatchOutcome {
    /// Process exit code for the CLI.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success | Self::NoPatchNeeded => 0,
            Self::Blocked { .. } => 2,
            Self::MountFailed { .. } => 3,
            Self::PatchFailed { .. } => 4,
            Self::SealFailed { .. } => 5,
        }
    }
}

impl UnpatchOutcome {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RevertedNatively | Self::RevertedManually { .. } => 0,
            Self::Blocked { .. } => 2,
            Self::MountFailed { .. } => 3,
            Self::RevertUnavailable => 4,
            Self::SealFailed { .. } => 5,
        }
    }
}
