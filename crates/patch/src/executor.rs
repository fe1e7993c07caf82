//! Sequential plan execution

use std::path::Path;

use rootpatch_errors::{Error, PatchError};
use rootpatch_events::{AppEvent, EventEmitter, PatchEvent};
use rootpatch_platform::{ToolCommand, ToolRunner};
use rootpatch_types::{DefaultValue, PatchOperation, PatchPlan};

/// Apply every operation of the plan in order.
///
/// Aborts on the first failing command. There is no rollback here; a
/// partially patched volume is a recognized state that the unpatch workflow
/// recovers from.
pub async fn apply_plan(
    plan: &PatchPlan,
    runner: &dyn ToolRunner,
    emitter: &impl EventEmitter,
) -> Result<(), Error> {
    emitter.emit(AppEvent::Patch(PatchEvent::PlanReady {
        operations: plan.len(),
        categories: plan
            .categories()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    }));

    let total = plan.len();
    for (index, planned) in plan.operations.iter().enumerate() {
        let index = index + 1;
        let description = planned.operation.describe();

        if let PatchOperation::DeleteTree { name, dest_root } = &planned.operation {
            let target = dest_root.join(name);
            if !runner.path_exists(&target) {
                emitter.emit(AppEvent::Patch(PatchEvent::OperationSkipped {
                    description,
                    reason: "not present".to_string(),
                }));
                continue;
            }
        }

        emitter.emit(AppEvent::Patch(PatchEvent::OperationStarted {
            index,
            total,
            description: description.clone(),
        }));
        execute(&planned.operation, runner, &description).await?;
        emitter.emit(AppEvent::Patch(PatchEvent::OperationCompleted {
            index,
            total,
            description,
        }));
    }

    emitter.emit(AppEvent::Patch(PatchEvent::Completed { operations: total }));
    Ok(())
}

async fn execute(
    operation: &PatchOperation,
    runner: &dyn ToolRunner,
    description: &str,
) -> Result<(), Error> {
    match operation {
        PatchOperation::AddTree {
            name,
            source,
            dest_root,
        } => {
            if !runner.path_exists(source) {
                return Err(PatchError::PayloadMissing {
                    path: source.display().to_string(),
                }
                .into());
            }
            let target = dest_root.join(name);
            if runner.path_exists(&target) {
                checked(
                    runner,
                    ToolCommand::new("rm")
                        .arg("-R")
                        .arg(target.display().to_string()),
                    description,
                )
                .await?;
            }
            checked(
                runner,
                ToolCommand::new("cp")
                    .arg("-R")
                    .arg(source.display().to_string())
                    .arg(target.display().to_string()),
                description,
            )
            .await?;
            normalize(runner, &target, description).await
        }
        PatchOperation::DeleteTree { name, dest_root } => {
            // Absence was handled by the caller.
            checked(
                runner,
                ToolCommand::new("rm")
                    .arg("-R")
                    .arg(dest_root.join(name).display().to_string()),
                description,
            )
            .await
        }
        PatchOperation::MergeTree {
            source_root,
            dest_root,
            normalize: subtrees,
        } => {
            if !runner.path_exists(source_root) {
                return Err(PatchError::PayloadMissing {
                    path: source_root.display().to_string(),
                }
                .into());
            }
            checked(
                runner,
                ToolCommand::new("rsync")
                    .args(["-r", "-i", "-a"])
                    .arg(format!("{}/", source_root.display()))
                    .arg(dest_root.display().to_string()),
                description,
            )
            .await?;
            for subtree in subtrees {
                normalize(runner, &dest_root.join(subtree), description).await?;
            }
            Ok(())
        }
        PatchOperation::WriteDefault { domain, key, value } => {
            let command = match value {
                DefaultValue::Bool(b) => ToolCommand::new("defaults")
                    .args(["write", domain, key, "-bool"])
                    .arg(if *b { "true" } else { "false" }),
                DefaultValue::Str(s) => ToolCommand::new("defaults")
                    .args(["write", domain, key, "-string"])
                    .arg(s),
            };
            checked(runner, command, description).await
        }
    }
}

/// Installed trees must be root-owned and world-readable or the kernel
/// refuses to load them.
async fn normalize(runner: &dyn ToolRunner, target: &Path, description: &str) -> Result<(), Error> {
    let target = target.display().to_string();
    checked(
        runner,
        ToolCommand::new("chmod").args(["-Rf", "755"]).arg(&target),
        description,
    )
    .await?;
    checked(
        runner,
        ToolCommand::new("chown")
            .args(["-Rf", "root:wheel"])
            .arg(&target),
        description,
    )
    .await
}

async fn checked(
    runner: &dyn ToolRunner,
    command: ToolCommand,
    description: &str,
) -> Result<(), Error> {
    let output = runner.run(command).await?;
    if output.success() {
        Ok(())
    } else {
        Err(PatchError::OperationFailed {
            description: description.to_string(),
            diagnostic: output.combined(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootpatch_platform::FakeHost;
    use rootpatch_types::PatchCategory;
    use std::path::PathBuf;

    fn quiet() -> rootpatch_events::EventSender {
        rootpatch_events::channel().0
    }

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn add(name: &str, source: &str, dest_root: &str) -> PatchOperation {
        PatchOperation::AddTree {
            name: name.to_string(),
            source: PathBuf::from(source),
            dest_root: PathBuf::from(dest_root),
        }
    }

    #[tokio::test]
    async fn add_tree_replaces_and_normalizes() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        write(&host.resolve("/payloads/kexts/nvidia/GeForce.kext/new"), "n");
        write(&host.resolve("/mnt/System/Library/Extensions/GeForce.kext/old"), "o");

        let mut plan = PatchPlan::default();
        plan.push(
            PatchCategory::Graphics,
            add(
                "GeForce.kext",
                "/payloads/kexts/nvidia/GeForce.kext",
                "/mnt/System/Library/Extensions",
            ),
        );
        apply_plan(&plan, &host, &quiet()).await.unwrap();

        let installed = host.resolve("/mnt/System/Library/Extensions/GeForce.kext");
        assert!(installed.join("new").exists());
        assert!(!installed.join("old").exists());
        let calls = host.invocations();
        assert!(calls.iter().any(|c| c.starts_with("chmod -Rf 755")));
        assert!(calls.iter().any(|c| c.starts_with("chown -Rf root:wheel")));
    }

    #[tokio::test]
    async fn add_tree_can_install_under_a_different_name() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        write(
            &host.resolve("/payloads/kexts/intel-gen2/AppleIntelSNBGraphicsFB-Clean.kext/fb"),
            "f",
        );

        let mut plan = PatchPlan::default();
        plan.push(
            PatchCategory::Graphics,
            add(
                "AppleIntelSNBGraphicsFB.kext",
                "/payloads/kexts/intel-gen2/AppleIntelSNBGraphicsFB-Clean.kext",
                "/mnt/System/Library/Extensions",
            ),
        );
        apply_plan(&plan, &host, &quiet()).await.unwrap();

        assert!(host
            .resolve("/mnt/System/Library/Extensions/AppleIntelSNBGraphicsFB.kext/fb")
            .exists());
    }

    #[tokio::test]
    async fn delete_of_a_missing_tree_is_a_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());

        let mut plan = PatchPlan::default();
        plan.push(
            PatchCategory::Graphics,
            PatchOperation::DeleteTree {
                name: "AMDRadeonX4000.kext".to_string(),
                dest_root: PathBuf::from("/mnt/System/Library/Extensions"),
            },
        );
        apply_plan(&plan, &host, &quiet()).await.unwrap();
        assert!(host.invocations().is_empty());
    }

    #[tokio::test]
    async fn merge_preserves_unrelated_destination_files() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        write(
            &host.resolve("/payloads/overlays/frameworks-accel/OpenGL.framework/gl"),
            "g",
        );
        write(
            &host.resolve("/mnt/System/Library/Frameworks/Metal.framework/metal"),
            "m",
        );

        let mut plan = PatchPlan::default();
        plan.push(
            PatchCategory::GraphicsFrameworks,
            PatchOperation::MergeTree {
                source_root: PathBuf::from("/payloads/overlays/frameworks-accel"),
                dest_root: PathBuf::from("/mnt/System/Library/Frameworks"),
                normalize: vec!["OpenGL.framework".to_string()],
            },
        );
        apply_plan(&plan, &host, &quiet()).await.unwrap();

        assert!(host
            .resolve("/mnt/System/Library/Frameworks/OpenGL.framework/gl")
            .exists());
        assert!(host
            .resolve("/mnt/System/Library/Frameworks/Metal.framework/metal")
            .exists());
        assert!(host
            .invocations()
            .iter()
            .any(|c| c == "chmod -Rf 755 /mnt/System/Library/Frameworks/OpenGL.framework"));
    }

    #[tokio::test]
    async fn write_default_renders_the_typed_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());

        let mut plan = PatchPlan::default();
        plan.push(
            PatchCategory::GraphicsFrameworks,
            PatchOperation::WriteDefault {
                domain: "/Library/Preferences/com.apple.security.libraryvalidation.plist"
                    .to_string(),
                key: "DisableLibraryValidation".to_string(),
                value: DefaultValue::Bool(true),
            },
        );
        apply_plan(&plan, &host, &quiet()).await.unwrap();

        assert!(host.invocations().iter().any(|c| c
            == "defaults write /Library/Preferences/com.apple.security.libraryvalidation.plist DisableLibraryValidation -bool true"));
    }

    #[tokio::test]
    async fn first_failure_aborts_the_rest_of_the_plan() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        write(&host.resolve("/payloads/kexts/nvidia/A.kext/a"), "a");
        write(&host.resolve("/payloads/kexts/nvidia/B.kext/b"), "b");
        write(&host.resolve("/payloads/kexts/nvidia/C.kext/c"), "c");
        host.fail_matching(
            "cp -R /payloads/kexts/nvidia/B.kext",
            "cp: No space left on device",
        );

        let mut plan = PatchPlan::default();
        for name in ["A.kext", "B.kext", "C.kext"] {
            plan.push(
                PatchCategory::Graphics,
                add(
                    name,
                    &format!("/payloads/kexts/nvidia/{name}"),
                    "/mnt/System/Library/Extensions",
                ),
            );
        }
        let err = apply_plan(&plan, &host, &quiet()).await.unwrap_err();
        assert!(err.to_string().contains("patch operation failed"));

        // A landed, B failed, C never ran.
        assert!(host.resolve("/mnt/System/Library/Extensions/A.kext/a").exists());
        assert!(!host.resolve("/mnt/System/Library/Extensions/B.kext").exists());
        assert!(!host.resolve("/mnt/System/Library/Extensions/C.kext").exists());
        assert!(!host
            .invocations()
            .iter()
            .any(|c| c.contains("C.kext")));
    }

    #[tokio::test]
    async fn missing_payload_is_reported_before_any_mutation() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());

        let mut plan = PatchPlan::default();
        plan.push(
            PatchCategory::Graphics,
            add(
                "GeForce.kext",
                "/payloads/kexts/nvidia/GeForce.kext",
                "/mnt/System/Library/Extensions",
            ),
        );
        let err = apply_plan(&plan, &host, &quiet()).await.unwrap_err();
        assert!(err.to_string().contains("payload tree missing"));
        assert!(host.invocations().is_empty());
    }
}
