use serde::{Deserialize, Serialize};

use std::path::PathBuf;

/// Root volume mount, unmount and seal-state events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VolumeEvent {
    MountStarted { device: String },

    /// The snapshot volume was already mounted from an earlier run
    AlreadyMounted { mount_point: PathBuf },

    Mounted { device: String, mount_point: PathBuf },

    Unmounted { device: String },

    /// Result of a `diskutil apfs listSnapshots` seal probe
    SealChecked { sealed: bool },
}
