use serde::{Deserialize, Serialize};

/// Backup creation and restore events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackupEvent {
    BackupStarted { directory: String },

    BackupCreated { directory: String },

    /// An archive from an earlier run already covers the directory
    BackupReused { directory: String },

    RestoreStarted { directory: String },

    RestoreCompleted { directory: String },

    /// No archive exists for the directory; restore moves on
    RestoreSkipped { directory: String },
}
