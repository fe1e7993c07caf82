//! Discovering the root device and mounting it writable

use std::path::Path;

use rootpatch_errors::{Error, VolumeError};
use rootpatch_events::{AppEvent, EventEmitter, VolumeEvent};
use rootpatch_platform::{run_checked, ToolCommand, ToolRunner};
use rootpatch_types::{MacosRelease, OsVersion, VolumeHandle, VolumeVariant};

/// Line `diskutil apfs list` prints for a sealed system snapshot. The
/// column padding is part of the match.
pub const SEAL_MARKER: &str = "Snapshot Sealed:           Yes";

/// Resolve the device identifier backing the booted root volume.
///
/// When booted from a snapshot the identifier carries an extra snapshot
/// suffix (`disk1s5s1`); patching targets the underlying volume, so the
/// suffix is stripped.
pub async fn find_root_device(runner: &dyn ToolRunner) -> Result<String, Error> {
    let output = run_checked(runner, ToolCommand::new("diskutil").args(["info", "/"])).await?;
    let identifier = output
        .stdout
        .lines()
        .find_map(|line| line.trim_start().strip_prefix("Device Identifier:"))
        .map(str::trim)
        .ok_or(VolumeError::DeviceNotFound)?
        .to_string();
    if !identifier.starts_with("disk") {
        return Err(VolumeError::UnexpectedDevice { identifier }.into());
    }
    if identifier.matches('s').count() > 1 {
        Ok(identifier[..identifier.len() - 2].to_string())
    } else {
        Ok(identifier)
    }
}

/// Probe whether the system volume still carries its factory seal.
pub async fn check_seal(
    runner: &dyn ToolRunner,
    emitter: &impl EventEmitter,
) -> Result<bool, Error> {
    let output = run_checked(runner, ToolCommand::new("diskutil").args(["apfs", "list"])).await?;
    let sealed = output.stdout.contains(SEAL_MARKER);
    emitter.emit(AppEvent::Volume(VolumeEvent::SealChecked { sealed }));
    Ok(sealed)
}

/// Mount the root volume writable and return a handle to it.
///
/// Idempotent on the snapshot variant: if a previous run left the volume
/// mounted, the existing mount is reused and `freshly_mounted` is false.
pub async fn mount(
    runner: &dyn ToolRunner,
    os: &OsVersion,
    mount_point: &Path,
    emitter: &impl EventEmitter,
) -> Result<VolumeHandle, Error> {
    let device = find_root_device(runner).await?;
    emitter.emit(AppEvent::Volume(VolumeEvent::MountStarted {
        device: device.clone(),
    }));

    if !os.release.uses_snapshots() {
        // The live root is the patch target. Only Catalina mounts the
        // system volume read-only by default.
        if os.release == MacosRelease::Catalina {
            let output = runner
                .run(ToolCommand::new("mount").args(["-uw", "/"]))
                .await?;
            if !output.success() {
                return Err(VolumeError::MountFailed {
                    device,
                    output: output.combined(),
                }
                .into());
            }
        }
        let handle = VolumeHandle {
            device: device.clone(),
            mount_point: "/".into(),
            data_root: "/".into(),
            freshly_mounted: false,
            variant: VolumeVariant::WritableRoot,
        };
        emitter.emit(AppEvent::Volume(VolumeEvent::Mounted {
            device,
            mount_point: handle.mount_point.clone(),
        }));
        return Ok(handle);
    }

    let handle = VolumeHandle {
        device: device.clone(),
        mount_point: mount_point.to_path_buf(),
        data_root: "/".into(),
        freshly_mounted: true,
        variant: VolumeVariant::SnapshotSealed,
    };

    if runner.path_exists(&handle.extensions()) {
        emitter.emit(AppEvent::Volume(VolumeEvent::AlreadyMounted {
            mount_point: handle.mount_point.clone(),
        }));
        return Ok(VolumeHandle {
            freshly_mounted: false,
            ..handle
        });
    }

    let output = runner
        .run(
            ToolCommand::new("mount")
                .args(["-o", "nobrowse", "-t", "apfs"])
                .arg(format!("/dev/{device}"))
                .arg(mount_point.display().to_string()),
        )
        .await?;
    if !output.success() {
        return Err(VolumeError::MountFailed {
            device,
            output: output.combined(),
        }
        .into());
    }
    if !runner.path_exists(&handle.extensions()) {
        return Err(VolumeError::NotVisibleAfterMount {
            mount_point: handle.mount_point.display().to_string(),
        }
        .into());
    }

    emitter.emit(AppEvent::Volume(VolumeEvent::Mounted {
        device,
        mount_point: handle.mount_point.clone(),
    }));
    Ok(handle)
}

/// Best-effort unmount of the snapshot mount. A failure here is harmless
/// (the mount disappears on reboot anyway) so it is logged, never raised.
pub async fn unmount(runner: &dyn ToolRunner, handle: &VolumeHandle, emitter: &impl EventEmitter) {
    if handle.variant == VolumeVariant::WritableRoot {
        return;
    }
    match runner
        .run(ToolCommand::new("diskutil").args(["unmount", &handle.device]))
        .await
    {
        Ok(output) if output.success() => {
            emitter.emit(AppEvent::Volume(VolumeEvent::Unmounted {
                device: handle.device.clone(),
            }));
        }
        Ok(output) => {
            emitter.emit_warning(format!(
                "failed to unmount {}: {}",
                handle.device,
                output.combined()
            ));
        }
        Err(error) => {
            emitter.emit_warning(format!("failed to unmount {}: {error}", handle.device));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootpatch_platform::{FakeHost, ToolOutput};

    fn monterey() -> OsVersion {
        OsVersion {
            release: MacosRelease::Monterey,
            minor: 1,
            build: "21C52".to_string(),
        }
    }

    fn quiet() -> rootpatch_events::EventSender {
        rootpatch_events::channel().0
    }

    fn diskutil_info(identifier: &str) -> ToolOutput {
        ToolOutput::ok(format!(
            "   Device Identifier:        {identifier}\n   Volume Name:              Macintosh HD\n"
        ))
    }

    #[tokio::test]
    async fn snapshot_suffix_is_stripped_from_the_device() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub("diskutil info", diskutil_info("disk1s5s1"));

        assert_eq!(find_root_device(&host).await.unwrap(), "disk1s5");
    }

    #[tokio::test]
    async fn plain_device_is_kept_as_is() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub("diskutil info", diskutil_info("disk3s1"));

        assert_eq!(find_root_device(&host).await.unwrap(), "disk3s1");
    }

    #[tokio::test]
    async fn garbage_identifier_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub("diskutil info", diskutil_info("/dev/null"));

        let err = find_root_device(&host).await.unwrap_err();
        assert!(err.to_string().contains("/dev/null"));
    }

    #[tokio::test]
    async fn mount_targets_the_underlying_volume() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub("diskutil info", diskutil_info("disk1s5s1"));

        let handle = mount(
            &host,
            &monterey(),
            Path::new("/System/Volumes/Update/mnt1"),
            &quiet(),
        )
        .await
        .unwrap();

        assert_eq!(handle.device, "disk1s5");
        assert!(handle.freshly_mounted);
        assert_eq!(handle.variant, VolumeVariant::SnapshotSealed);
        assert!(host.invocations().iter().any(|c| c
            == "mount -o nobrowse -t apfs /dev/disk1s5 /System/Volumes/Update/mnt1"));
    }

    #[tokio::test]
    async fn existing_mount_is_reused_without_remounting() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub("diskutil info", diskutil_info("disk1s5s1"));
        std::fs::create_dir_all(
            host.resolve("/System/Volumes/Update/mnt1/System/Library/Extensions"),
        )
        .unwrap();

        let handle = mount(
            &host,
            &monterey(),
            Path::new("/System/Volumes/Update/mnt1"),
            &quiet(),
        )
        .await
        .unwrap();

        assert!(!handle.freshly_mounted);
        assert!(!host.invocations().iter().any(|c| c.starts_with("mount")));
    }

    #[tokio::test]
    async fn mount_failure_surfaces_the_tool_output() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub("diskutil info", diskutil_info("disk1s5s1"));
        host.fail_matching("mount -o nobrowse", "mount_apfs: volume could not be mounted");

        let err = mount(
            &host,
            &monterey(),
            Path::new("/System/Volumes/Update/mnt1"),
            &quiet(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("could not be mounted"));
    }

    #[tokio::test]
    async fn catalina_remounts_the_live_root() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub("diskutil info", diskutil_info("disk1s1"));
        let os = OsVersion {
            release: MacosRelease::Catalina,
            minor: 7,
            build: "19H15".to_string(),
        };

        let handle = mount(&host, &os, Path::new("/System/Volumes/Update/mnt1"), &quiet())
            .await
            .unwrap();

        assert_eq!(handle.variant, VolumeVariant::WritableRoot);
        assert_eq!(handle.mount_point, Path::new("/"));
        assert!(host.invocations().iter().any(|c| c == "mount -uw /"));
    }

    #[tokio::test]
    async fn seal_probe_reads_the_apfs_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub(
            "diskutil apfs list",
            ToolOutput::ok(format!("|   {SEAL_MARKER}\n")),
        );
        assert!(check_seal(&host, &quiet()).await.unwrap());

        let host = FakeHost::new(tmp.path());
        host.stub(
            "diskutil apfs list",
            ToolOutput::ok("|   Snapshot Sealed:           Broken\n"),
        );
        assert!(!check_seal(&host, &quiet()).await.unwrap());
    }
}
