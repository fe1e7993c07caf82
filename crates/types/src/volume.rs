//! Writable root volume handle
//!
//! Created by the mounter, destroyed by the unmounter (or by the sealer
//! after a successful reseal), never reused across runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How the booted OS exposes its root filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeVariant {
    /// Big Sur and newer: root is a sealed APFS snapshot, patched through a
    /// separate writable mount of the update volume.
    SnapshotSealed,
    /// Catalina and older: root remounted read-write in place.
    WritableRoot,
}

/// A mounted, writable view of the root volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeHandle {
    /// Underlying device identifier, e.g. `disk1s5`.
    pub device: String,
    /// Where the writable system tree is rooted. Empty-path means the live
    /// root itself (legacy variant).
    pub mount_point: PathBuf,
    /// Root for data-volume paths that are patched live rather than through
    /// the snapshot mount (`/Library/Application Support` and friends).
    pub data_root: PathBuf,
    /// Whether this run performed the mount (vs. finding it already mounted).
    pub freshly_mounted: bool,
    pub variant: VolumeVariant,
}

impl VolumeHandle {
    #[must_use]
    pub fn system_library(&self) -> PathBuf {
        self.mount_point.join("System/Library")
    }

    #[must_use]
    pub fn extensions(&self) -> PathBuf {
        self.mount_point.join("System/Library/Extensions")
    }

    #[must_use]
    pub fn frameworks(&self) -> PathBuf {
        self.mount_point.join("System/Library/Frameworks")
    }

    #[must_use]
    pub fn private_frameworks(&self) -> PathBuf {
        self.mount_point.join("System/Library/PrivateFrameworks")
    }

    #[must_use]
    pub fn core_services(&self) -> PathBuf {
        self.mount_point.join("System/Library/CoreServices")
    }

    #[must_use]
    pub fn launch_daemons(&self) -> PathBuf {
        self.mount_point.join("System/Library/LaunchDaemons")
    }

    #[must_use]
    pub fn libexec(&self) -> PathBuf {
        self.mount_point.join("usr/libexec")
    }

    /// Plugin directory of AppleGraphicsControl, where the mux control kext
    /// lives.
    #[must_use]
    pub fn mux_plugins(&self) -> PathBuf {
        self.mount_point
            .join("System/Library/Extensions/AppleGraphicsControl.kext/Contents/PlugIns")
    }

    /// SkyLight plugin drop point on the data volume (patched live, not
    /// through the snapshot mount).
    #[must_use]
    pub fn application_support(&self) -> PathBuf {
        self.data_root.join("Library/Application Support")
    }

    /// Path of a backup archive for a top-level backup directory name.
    #[must_use]
    pub fn backup_archive(&self, directory: &str) -> PathBuf {
        self.mount_point.join(format!("{directory}-Backup.zip"))
    }

    /// Resolve a backup-list entry (e.g. `System/Library/Extensions`) to its
    /// live path inside the mount.
    #[must_use]
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.mount_point.join(relative)
    }
}
