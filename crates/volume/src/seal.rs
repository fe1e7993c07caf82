//! Kernel cache rebuild and snapshot sealing

use rootpatch_errors::{Error, SealError};
use rootpatch_events::{AppEvent, EventEmitter, SealEvent};
use rootpatch_platform::{ToolCommand, ToolRunner};
use rootpatch_types::{MacosRelease, OsVersion, VolumeHandle, VolumeVariant};

use crate::mount::unmount;

/// Bless output signature of the APFS volume-layout bug. When present the
/// machine needs a clean install; retrying never succeeds.
pub const APFS_SNAPSHOT_BUG: &str =
    "Can't use last-sealed-snapshot or create-snapshot on non system volume";

/// `kextcache` exits 0 even when it fails. Before Catalina this line is the
/// only reliable success signal.
const KEXTCACHE_SUCCESS_MARKER: &str = "KernelCache ID";

/// Outcome of a native snapshot revert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeRevert {
    Reverted,
    /// The last sealed snapshot could not be restored; fall back to the
    /// backup archives.
    Failed { diagnostic: String },
}

/// Rebuild the kernel caches on the mounted volume.
///
/// Modern systems use `kmutil` against the snapshot mount; legacy systems
/// run `kextcache` in place, plus the dyld shared cache tools.
pub async fn rebuild_caches(
    runner: &dyn ToolRunner,
    handle: &VolumeHandle,
    os: &OsVersion,
    emitter: &impl EventEmitter,
) -> Result<(), Error> {
    let mount = handle.mount_point.display().to_string();

    if handle.variant == VolumeVariant::SnapshotSealed {
        emitter.emit(AppEvent::Seal(SealEvent::CacheRebuildStarted {
            tool: "kmutil".to_string(),
        }));
        let output = runner
            .run(
                ToolCommand::new("kmutil")
                    .arg("install")
                    .arg("--volume-root")
                    .arg(&mount)
                    .arg("--update-all"),
            )
            .await?;
        if !output.success() {
            return Err(SealError::CacheRebuildFailed {
                diagnostic: output.combined(),
            }
            .into());
        }
        emitter.emit(AppEvent::Seal(SealEvent::CacheRebuildCompleted {
            tool: "kmutil".to_string(),
        }));
        return Ok(());
    }

    emitter.emit(AppEvent::Seal(SealEvent::CacheRebuildStarted {
        tool: "kextcache".to_string(),
    }));
    let output = runner
        .run(ToolCommand::new("kextcache").arg("-i").arg(format!("{mount}/")))
        .await?;
    let marker_missing = os.release < MacosRelease::Catalina
        && !output.combined().contains(KEXTCACHE_SUCCESS_MARKER);
    if !output.success() || marker_missing {
        return Err(SealError::CacheRebuildFailed {
            diagnostic: output.combined(),
        }
        .into());
    }
    emitter.emit(AppEvent::Seal(SealEvent::CacheRebuildCompleted {
        tool: "kextcache".to_string(),
    }));

    if os.release == MacosRelease::Catalina {
        let output = runner.run(ToolCommand::new("kcditto")).await?;
        if !output.success() {
            return Err(SealError::CacheRebuildFailed {
                diagnostic: output.combined(),
            }
            .into());
        }
    }
    let output = runner
        .run(
            ToolCommand::new("update_dyld_shared_cache")
                .arg("-root")
                .arg(format!("{mount}/")),
        )
        .await?;
    if !output.success() {
        return Err(SealError::CacheRebuildFailed {
            diagnostic: output.combined(),
        }
        .into());
    }
    Ok(())
}

/// Bless a new snapshot of the patched volume so it becomes the boot root.
pub async fn create_snapshot(
    runner: &dyn ToolRunner,
    handle: &VolumeHandle,
    emitter: &impl EventEmitter,
) -> Result<(), Error> {
    emitter.emit(AppEvent::Seal(SealEvent::SnapshotCreationStarted));
    let output = runner
        .run(
            ToolCommand::new("bless")
                .arg("--folder")
                .arg(handle.core_services().display().to_string())
                .arg("--bootefi")
                .arg("--create-snapshot"),
        )
        .await?;
    if !output.success() {
        let diagnostic = output.combined();
        return Err(SealError::SnapshotCreationFailed {
            apfs_bug: diagnostic.contains(APFS_SNAPSHOT_BUG),
            diagnostic,
        }
        .into());
    }
    emitter.emit(AppEvent::Seal(SealEvent::SnapshotCreated));
    Ok(())
}

/// Rebuild caches and, on snapshot systems, bless a new snapshot and drop
/// the writable mount. On failure the mount is left in place for manual
/// inspection.
pub async fn seal(
    runner: &dyn ToolRunner,
    handle: &VolumeHandle,
    os: &OsVersion,
    emitter: &impl EventEmitter,
) -> Result<(), Error> {
    rebuild_caches(runner, handle, os, emitter).await?;
    if handle.variant == VolumeVariant::SnapshotSealed {
        create_snapshot(runner, handle, emitter).await?;
        unmount(runner, handle, emitter).await;
    } else {
        emitter.emit(AppEvent::Seal(SealEvent::SnapshotSkipped {
            reason: "root volume is patched in place, no snapshot to seal".to_string(),
        }));
    }
    Ok(())
}

/// Ask the firmware tools to boot from the last factory-sealed snapshot,
/// discarding every root patch at once.
pub async fn revert_to_sealed_snapshot(
    runner: &dyn ToolRunner,
    handle: &VolumeHandle,
    emitter: &impl EventEmitter,
) -> Result<NativeRevert, Error> {
    let output = runner
        .run(
            ToolCommand::new("bless")
                .arg("--mount")
                .arg(handle.mount_point.display().to_string())
                .arg("--bootefi")
                .arg("--last-sealed-snapshot"),
        )
        .await?;
    if output.success() {
        Ok(NativeRevert::Reverted)
    } else {
        let diagnostic = output.combined();
        emitter.emit_warning(format!(
            "last-sealed-snapshot revert failed, falling back to backups: {diagnostic}"
        ));
        Ok(NativeRevert::Failed { diagnostic })
    }
}
