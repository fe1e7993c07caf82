//! Backup records for the patched system directories
//!
//! Three directories are archived before the first mutation touches them.
//! The archives live next to their directories as `<Name>-Backup.zip` and
//! survive until the operator reverts or clean-installs.

use serde::{Deserialize, Serialize};

/// Top-level directories backed up before patching, relative to the mount
/// point. Order is the restore order.
pub const BACKUP_LOCATIONS: [&str; 3] = [
    "System/Library/Extensions",
    "System/Library/Frameworks",
    "System/Library/PrivateFrameworks",
];

/// What a backup pass did for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Directories archived by this run.
    pub created: Vec<String>,
    /// Directories whose archive already existed and was left untouched.
    pub reused: Vec<String>,
}

impl BackupRecord {
    #[must_use]
    pub fn total(&self) -> usize {
        self.created.len() + self.reused.len()
    }
}

/// Result of restoring one directory during a revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertStatus {
    Restored,
    /// No archive was found for the directory.
    NoArchive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRevert {
    pub directory: String,
    pub status: RevertStatus,
}
