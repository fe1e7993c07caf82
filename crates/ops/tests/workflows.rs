//! End-to-end workflow tests against the in-process tool host

use std::path::PathBuf;
use std::sync::Arc;

use rootpatch_config::{Config, DEFAULT_MOUNT_POINT};
use rootpatch_events::channel;
use rootpatch_guard::Blocker;
use rootpatch_ops::{OrchestratorBuilder, PatchOutcome, UnpatchOutcome};
use rootpatch_platform::{FakeHost, ToolOutput, ToolRunner};
use rootpatch_types::{
    Gpu, GpuArch, HardwareProfile, MacosRelease, OsVersion, PatchOperation, PatchPlan,
    PayloadLayout, RevertStatus, VolumeHandle, VolumeVariant, WifiChipset,
};

fn monterey() -> OsVersion {
    OsVersion::new(MacosRelease::Monterey, 1, "21C52")
}

fn tesla_profile() -> HardwareProfile {
    HardwareProfile {
        model: "MacBookPro4,1".to_string(),
        board_id: "Mac-F42C89C8".to_string(),
        gpus: vec![Gpu::new(0x10DE, 0x0407, GpuArch::NvidiaTesla)],
        wifi: WifiChipset::Modern,
        discrete_gpu: None,
        has_integrated_gpu: false,
        boot_args: "amfi_get_out_of_my_way=1".to_string(),
        applealc_loaded: false,
    }
}

fn modern_profile() -> HardwareProfile {
    HardwareProfile {
        gpus: Vec::new(),
        boot_args: String::new(),
        ..tesla_profile()
    }
}

/// Stub the probes a clean patchable Monterey host answers.
fn stub_permissive_host(host: &FakeHost) {
    host.stub(
        "diskutil info",
        ToolOutput::ok("   Device Identifier:        disk1s5s1\n"),
    );
    // 0xA03: SIP lowered far enough for snapshot-era patching.
    host.stub(
        "nvram csr-active-config",
        ToolOutput::ok("csr-active-config\t%03%0a%00%00"),
    );
    host.stub("fdesetup status", ToolOutput::ok("FileVault is Off.\n"));
}

fn expected_handle() -> VolumeHandle {
    VolumeHandle {
        device: "disk1s5".to_string(),
        mount_point: PathBuf::from(DEFAULT_MOUNT_POINT),
        data_root: PathBuf::from("/"),
        freshly_mounted: true,
        variant: VolumeVariant::SnapshotSealed,
    }
}

/// Materialize every payload tree the plan references.
fn seed_plan_sources(host: &FakeHost, plan: &PatchPlan) {
    for planned in &plan.operations {
        let source = match &planned.operation {
            PatchOperation::AddTree { source, .. } => source,
            PatchOperation::MergeTree { source_root, .. } => source_root,
            _ => continue,
        };
        let marker = host.resolve(source).join("payload");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(marker, "p").unwrap();
    }
}

fn orchestrator(host: &Arc<FakeHost>, profile: HardwareProfile) -> rootpatch_ops::Orchestrator {
    let (tx, rx) = channel();
    // Emission on a closed channel is silently dropped.
    drop(rx);
    let runner: Arc<dyn ToolRunner> = Arc::clone(host) as Arc<dyn ToolRunner>;
    OrchestratorBuilder::new()
        .config(Config::default())
        .os(monterey())
        .profile(profile)
        .payloads(PayloadLayout::new("/payloads"))
        .runner(runner)
        .event_sender(tx)
        .build()
        .unwrap()
}

fn seeded_plan(host: &FakeHost, profile: &HardwareProfile) -> PatchPlan {
    let policy = rootpatch_config::PatchPolicy::default();
    let quiet = channel().0;
    let decision = rootpatch_resolver::resolve(profile, &monterey(), &policy, &quiet);
    let plan = rootpatch_resolver::build_plan(
        &decision,
        &monterey(),
        profile,
        &policy,
        &PayloadLayout::new("/payloads"),
        &expected_handle(),
    );
    seed_plan_sources(host, &plan);
    plan
}

#[tokio::test]
async fn no_patch_hardware_exits_before_touching_the_system() {
    let tmp = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(tmp.path()));
    let orch = orchestrator(&host, modern_profile());

    let outcome = orch.patch().await.unwrap();
    assert_eq!(outcome, PatchOutcome::NoPatchNeeded);
    assert!(host.invocations().is_empty());
}

#[tokio::test]
async fn blocked_host_never_reaches_the_mount_stage() {
    let tmp = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(tmp.path()));
    // No csr stub: SIP reads fully enabled.
    host.stub("fdesetup status", ToolOutput::ok("FileVault is Off.\n"));
    let orch = orchestrator(&host, tesla_profile());

    let outcome = orch.patch().await.unwrap();
    match outcome {
        PatchOutcome::Blocked { blockers } => {
            assert!(blockers
                .iter()
                .any(|b| matches!(b, Blocker::SipEnabled { .. })));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!host.invocations().iter().any(|c| c.starts_with("mount")));
}

#[tokio::test]
async fn successful_patch_applies_the_plan_and_seals() {
    let tmp = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(tmp.path()));
    stub_permissive_host(&host);
    let profile = tesla_profile();
    let plan = seeded_plan(&host, &profile);
    assert!(!plan.is_empty());

    let orch = orchestrator(&host, profile);
    let outcome = orch.patch().await.unwrap();
    assert_eq!(outcome, PatchOutcome::Success);

    // The first installed kext landed at its destination.
    let installed = plan
        .operations
        .iter()
        .find_map(|p| match &p.operation {
            PatchOperation::AddTree {
                name, dest_root, ..
            } => Some(dest_root.join(name)),
            _ => None,
        })
        .unwrap();
    assert!(host.resolve(installed).join("payload").exists());

    let calls = host.invocations();
    assert!(calls.iter().any(|c| c.starts_with("kmutil install")));
    assert!(calls
        .iter()
        .any(|c| c.starts_with("bless --folder") && c.ends_with("--create-snapshot")));
    assert!(calls.iter().any(|c| c == "diskutil unmount disk1s5"));
}

#[tokio::test]
async fn patch_failure_leaves_prior_operations_and_skips_sealing() {
    let tmp = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(tmp.path()));
    stub_permissive_host(&host);
    let profile = tesla_profile();
    let plan = seeded_plan(&host, &profile);
    host.fail_matching("rsync", "rsync: connection unexpectedly closed");

    let orch = orchestrator(&host, profile);
    let outcome = orch.patch().await.unwrap();
    match outcome {
        PatchOutcome::PatchFailed { diagnostic, .. } => {
            assert!(diagnostic.contains("rsync"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Kexts planned before the failing merge were installed and stay.
    let installed = plan
        .operations
        .iter()
        .find_map(|p| match &p.operation {
            PatchOperation::AddTree {
                name, dest_root, ..
            } => Some(dest_root.join(name)),
            _ => None,
        })
        .unwrap();
    assert!(host.resolve(installed).exists());

    let calls = host.invocations();
    assert!(!calls.iter().any(|c| c.starts_with("kmutil")));
    assert!(!calls.iter().any(|c| c.starts_with("bless")));
}

#[tokio::test]
async fn unpatch_prefers_the_native_snapshot_revert() {
    let tmp = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(tmp.path()));
    stub_permissive_host(&host);

    let orch = orchestrator(&host, tesla_profile());
    let outcome = orch.unpatch().await.unwrap();
    assert_eq!(outcome, UnpatchOutcome::RevertedNatively);

    let calls = host.invocations();
    assert!(calls.iter().any(|c| {
        c == "bless --mount /System/Volumes/Update/mnt1 --bootefi --last-sealed-snapshot"
    }));
    assert!(calls.iter().any(|c| c == "diskutil unmount disk1s5"));
    assert!(!calls.iter().any(|c| c.starts_with("unzip")));
}

#[tokio::test]
async fn unpatch_falls_back_to_backup_archives_and_reseals() {
    let tmp = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(tmp.path()));
    stub_permissive_host(&host);
    host.fail_matching("bless --mount", "Could not find last sealed snapshot");

    // A previous patch run left the mount and its backup archives behind.
    let handle = expected_handle();
    for location in rootpatch_types::BACKUP_LOCATIONS {
        let marker = host.resolve(handle.resolve(location)).join("pristine");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(marker, "pristine").unwrap();
    }
    let quiet = channel().0;
    rootpatch_patch::create_backup(host.as_ref(), &handle, &quiet)
        .await
        .unwrap();

    let orch = orchestrator(&host, tesla_profile());
    let outcome = orch.unpatch().await.unwrap();
    match outcome {
        UnpatchOutcome::RevertedManually { reverts } => {
            assert_eq!(reverts.len(), 3);
            assert!(reverts.iter().all(|r| r.status == RevertStatus::Restored));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let calls = host.invocations();
    assert!(calls.iter().any(|c| c.starts_with("kmutil install")));
    assert!(calls
        .iter()
        .any(|c| c.starts_with("bless --folder") && c.ends_with("--create-snapshot")));
}

#[tokio::test]
async fn unpatch_without_snapshot_or_archives_is_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(tmp.path()));
    stub_permissive_host(&host);
    host.fail_matching("bless --mount", "Could not find last sealed snapshot");

    let orch = orchestrator(&host, tesla_profile());
    let outcome = orch.unpatch().await.unwrap();
    assert_eq!(outcome, UnpatchOutcome::RevertUnavailable);
}

#[tokio::test]
async fn status_probes_without_mutating() {
    let tmp = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(tmp.path()));
    stub_permissive_host(&host);

    let orch = orchestrator(&host, tesla_profile());
    let report = orch.status().await.unwrap();
    assert!(report.decision.nvidia_legacy);
    assert!(report.gate.allowed());
    assert_eq!(report.sealed, Some(false));
    assert!(!host
        .invocations()
        .iter()
        .any(|c| c.starts_with("mount") || c.starts_with("cp") || c.starts_with("rm")));
}
