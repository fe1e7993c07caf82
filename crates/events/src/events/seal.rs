use serde::{Deserialize, Serialize};

/// Cache rebuild and snapshot sealing events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SealEvent {
    CacheRebuildStarted { tool: String },

    CacheRebuildCompleted { tool: String },

    SnapshotCreationStarted,

    SnapshotCreated,

    /// Snapshot creation does not apply on this OS variant
    SnapshotSkipped { reason: String },
}
