//! Backup archives for the patched system directories
//!
//! Archives are only taken on Big Sur while the volume is still sealed: on
//! that release the native last-sealed-snapshot revert is unreliable, so the
//! manual restore path needs pristine copies. Later releases rely on the
//! sealed snapshot itself and never pay the archive cost.

use rootpatch_errors::{Error, RevertError};
use rootpatch_events::{AppEvent, BackupEvent, EventEmitter};
use rootpatch_platform::{run_checked, ToolCommand, ToolRunner};
use rootpatch_types::{
    BackupRecord, DirectoryRevert, MacosRelease, OsVersion, RevertStatus, VolumeHandle,
    BACKUP_LOCATIONS,
};

/// Whether a manual revert is possible: the Extensions archive is the
/// indicator for the whole set.
#[must_use]
pub fn has_backup(runner: &dyn ToolRunner, handle: &VolumeHandle) -> bool {
    runner.path_exists(&handle.backup_archive(BACKUP_LOCATIONS[0]))
}

/// Archive the patch targets when this OS and seal state call for it.
pub async fn backup_if_needed(
    runner: &dyn ToolRunner,
    handle: &VolumeHandle,
    os: &OsVersion,
    sealed: bool,
    emitter: &impl EventEmitter,
) -> Result<BackupRecord, Error> {
    if os.release != MacosRelease::BigSur || !sealed {
        return Ok(BackupRecord::default());
    }
    create_backup(runner, handle, emitter).await
}

/// Archive every backup location next to itself as `<Name>-Backup.zip`.
/// Existing archives are kept; they hold the pristine pre-patch state and a
/// re-run must not overwrite them with already-patched trees.
pub async fn create_backup(
    runner: &dyn ToolRunner,
    handle: &VolumeHandle,
    emitter: &impl EventEmitter,
) -> Result<BackupRecord, Error> {
    let mut record = BackupRecord::default();

    for location in BACKUP_LOCATIONS {
        let archive = handle.backup_archive(location);
        if runner.path_exists(&archive) {
            emitter.emit(AppEvent::Backup(BackupEvent::BackupReused {
                directory: location.to_string(),
            }));
            record.reused.push(location.to_string());
            continue;
        }

        emitter.emit(AppEvent::Backup(BackupEvent::BackupStarted {
            directory: location.to_string(),
        }));
        let live = handle.resolve(location);
        let staging = handle.resolve(format!("{location}-Backup"));

        run_checked(
            runner,
            ToolCommand::new("cp")
                .arg("-r")
                .arg(live.display().to_string())
                .arg(staging.display().to_string()),
        )
        .await?;
        run_checked(
            runner,
            ToolCommand::new("ditto")
                .args(["-c", "-k", "--sequesterRsrc", "--keepParent"])
                .arg(staging.display().to_string())
                .arg(archive.display().to_string()),
        )
        .await?;
        run_checked(
            runner,
            ToolCommand::new("rm")
                .arg("-r")
                .arg(staging.display().to_string()),
        )
        .await?;

        emitter.emit(AppEvent::Backup(BackupEvent::BackupCreated {
            directory: location.to_string(),
        }));
        record.created.push(location.to_string());
    }

    Ok(record)
}

/// Restore every location from its archive, swapping the patched tree out
/// only once the pristine one is fully unpacked next to it.
pub async fn restore_backup(
    runner: &dyn ToolRunner,
    handle: &VolumeHandle,
    emitter: &impl EventEmitter,
) -> Result<Vec<DirectoryRevert>, Error> {
    if !has_backup(runner, handle) {
        return Err(RevertError::NoBackups.into());
    }

    let mut reverts = Vec::new();
    for location in BACKUP_LOCATIONS {
        let archive = handle.backup_archive(location);
        if !runner.path_exists(&archive) {
            emitter.emit(AppEvent::Backup(BackupEvent::RestoreSkipped {
                directory: location.to_string(),
            }));
            reverts.push(DirectoryRevert {
                directory: location.to_string(),
                status: RevertStatus::NoArchive,
            });
            continue;
        }

        emitter.emit(AppEvent::Backup(BackupEvent::RestoreStarted {
            directory: location.to_string(),
        }));
        restore_one(runner, handle, location, &archive)
            .await
            .map_err(|diagnostic| RevertError::RestoreFailed {
                directory: location.to_string(),
                diagnostic,
            })?;
        emitter.emit(AppEvent::Backup(BackupEvent::RestoreCompleted {
            directory: location.to_string(),
        }));
        reverts.push(DirectoryRevert {
            directory: location.to_string(),
            status: RevertStatus::Restored,
        });
    }

    Ok(reverts)
}

async fn restore_one(
    runner: &dyn ToolRunner,
    handle: &VolumeHandle,
    location: &str,
    archive: &std::path::Path,
) -> Result<(), String> {
    let live = handle.resolve(location);
    let Some(parent) = live.parent() else {
        return Err(format!("{location} has no parent directory"));
    };
    let pristine = handle.resolve(format!("{location}-Backup"));
    let patched = handle.resolve(format!("{location}-Patched"));

    // Unpack produces `<Name>-Backup` beside the live tree.
    checked(
        runner,
        ToolCommand::new("unzip")
            .arg("-q")
            .arg(archive.display().to_string())
            .arg("-d")
            .arg(parent.display().to_string()),
    )
    .await?;
    checked(
        runner,
        ToolCommand::new("mv")
            .arg(live.display().to_string())
            .arg(patched.display().to_string()),
    )
    .await?;
    checked(
        runner,
        ToolCommand::new("mv")
            .arg(pristine.display().to_string())
            .arg(live.display().to_string()),
    )
    .await?;
    checked(
        runner,
        ToolCommand::new("rm")
            .arg("-r")
            .arg(patched.display().to_string()),
    )
    .await
}

async fn checked(runner: &dyn ToolRunner, command: ToolCommand) -> Result<(), String> {
    let output = runner.run(command).await.map_err(|e| e.to_string())?;
    if output.success() {
        Ok(())
    } else {
        Err(output.combined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootpatch_platform::FakeHost;
    use rootpatch_types::VolumeVariant;
    use std::path::PathBuf;

    fn quiet() -> rootpatch_events::EventSender {
        rootpatch_events::channel().0
    }

    fn handle() -> VolumeHandle {
        VolumeHandle {
            device: "disk1s5".to_string(),
            mount_point: PathBuf::from("/System/Volumes/Update/mnt1"),
            data_root: PathBuf::from("/"),
            freshly_mounted: true,
            variant: VolumeVariant::SnapshotSealed,
        }
    }

    fn big_sur() -> OsVersion {
        OsVersion {
            release: MacosRelease::BigSur,
            minor: 6,
            build: "20G165".to_string(),
        }
    }

    fn seed_system_tree(host: &FakeHost, handle: &VolumeHandle) {
        for location in BACKUP_LOCATIONS {
            let marker = host.resolve(handle.resolve(location)).join("pristine");
            std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
            std::fs::write(marker, "pristine").unwrap();
        }
    }

    #[tokio::test]
    async fn backup_creates_one_archive_per_location() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        let handle = handle();
        seed_system_tree(&host, &handle);

        let record = create_backup(&host, &handle, &quiet()).await.unwrap();
        assert_eq!(record.created.len(), 3);
        assert!(record.reused.is_empty());
        for location in BACKUP_LOCATIONS {
            assert!(host.resolve(handle.backup_archive(location)).exists());
        }
        // Staging copies are cleaned up.
        assert!(!host
            .resolve(handle.resolve("System/Library/Extensions-Backup"))
            .exists());
    }

    #[tokio::test]
    async fn second_backup_run_reuses_the_archives() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        let handle = handle();
        seed_system_tree(&host, &handle);

        create_backup(&host, &handle, &quiet()).await.unwrap();
        let record = create_backup(&host, &handle, &quiet()).await.unwrap();
        assert!(record.created.is_empty());
        assert_eq!(record.reused.len(), 3);
    }

    #[tokio::test]
    async fn backup_only_runs_on_sealed_big_sur() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        let handle = handle();
        seed_system_tree(&host, &handle);

        let monterey = OsVersion {
            release: MacosRelease::Monterey,
            minor: 1,
            build: "21C52".to_string(),
        };
        let record = backup_if_needed(&host, &handle, &monterey, true, &quiet())
            .await
            .unwrap();
        assert_eq!(record.total(), 0);

        let record = backup_if_needed(&host, &handle, &big_sur(), false, &quiet())
            .await
            .unwrap();
        assert_eq!(record.total(), 0);
        assert!(host.invocations().is_empty());

        let record = backup_if_needed(&host, &handle, &big_sur(), true, &quiet())
            .await
            .unwrap();
        assert_eq!(record.created.len(), 3);
    }

    #[tokio::test]
    async fn restore_round_trips_the_pristine_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        let handle = handle();
        seed_system_tree(&host, &handle);
        create_backup(&host, &handle, &quiet()).await.unwrap();

        // Simulate patching: mutate the live Extensions tree.
        let extensions = host.resolve(handle.resolve("System/Library/Extensions"));
        std::fs::write(extensions.join("patched"), "patched").unwrap();
        std::fs::remove_file(extensions.join("pristine")).unwrap();

        let reverts = restore_backup(&host, &handle, &quiet()).await.unwrap();
        assert_eq!(reverts.len(), 3);
        assert!(reverts
            .iter()
            .all(|r| r.status == RevertStatus::Restored));

        let extensions = host.resolve(handle.resolve("System/Library/Extensions"));
        assert!(extensions.join("pristine").exists());
        assert!(!extensions.join("patched").exists());
        assert!(!host
            .resolve(handle.resolve("System/Library/Extensions-Patched"))
            .exists());
    }

    #[tokio::test]
    async fn restore_without_archives_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        let err = restore_backup(&host, &handle(), &quiet()).await.unwrap_err();
        assert!(err.to_string().contains("no backup archives"));
        assert!(host.invocations().is_empty());
    }

    #[tokio::test]
    async fn restore_failure_names_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        let handle = handle();
        seed_system_tree(&host, &handle);
        create_backup(&host, &handle, &quiet()).await.unwrap();
        host.fail_matching("mv", "mv: Operation not permitted");

        let err = restore_backup(&host, &handle, &quiet()).await.unwrap_err();
        assert!(err.to_string().contains("System/Library/Extensions"));
        assert!(err.to_string().contains("Operation not permitted"));
    }
}
