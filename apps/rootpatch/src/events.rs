//! Event rendering for the terminal

use rootpatch_events::{
    AppEvent, BackupEvent, GateEvent, GeneralEvent, PatchEvent, ResolverEvent, SealEvent,
    StageEvent, VolumeEvent,
};

/// Renders the core's event stream. In JSON mode every event goes to stdout
/// as one line; in plain mode events are filtered by level and formatted for
/// a human.
pub struct EventHandler {
    json: bool,
    debug: bool,
}

impl EventHandler {
    pub fn new(json: bool, debug: bool) -> Self {
        Self { json, debug }
    }

    pub fn handle(&mut self, event: &AppEvent) {
        if self.json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
            return;
        }
        if event.log_level() == tracing::Level::DEBUG && !self.debug {
            return;
        }
        if let Some(line) = render(event) {
            println!("{line}");
        }
    }
}

#[allow(clippy::too_many_lines)]
fn render(event: &AppEvent) -> Option<String> {
    match event {
        AppEvent::Stage(StageEvent::Entered { stage }) => Some(format!("==> {stage}")),
        AppEvent::Stage(StageEvent::Completed { .. }) => None,

        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, .. } => Some(format!("warning: {message}")),
            GeneralEvent::Error { message, .. } => Some(format!("error: {message}")),
            GeneralEvent::DebugLog { message } => Some(format!("debug: {message}")),
            GeneralEvent::OperationStarted { operation } => Some(format!("{operation}...")),
            GeneralEvent::OperationCompleted { operation, success } => {
                Some(format!("{operation}: {}", if *success { "ok" } else { "failed" }))
            }
            GeneralEvent::OperationFailed { operation, failure } => {
                let mut line = format!("{operation} failed: {}", failure.message);
                if let Some(hint) = &failure.hint {
                    line.push_str(&format!("\n  hint: {hint}"));
                }
                Some(line)
            }
        },

        AppEvent::Resolver(resolver) => match resolver {
            ResolverEvent::DetectionStarted => None,
            ResolverEvent::GpuDetected {
                vendor_id,
                device_id,
                arch,
                active,
            } => Some(format!(
                "gpu {vendor_id:04x}:{device_id:04x} {arch:?}{}",
                if *active { "" } else { " (disabled)" }
            )),
            ResolverEvent::CategoryEnabled { category } => Some(format!("needs: {category}")),
            ResolverEvent::DecisionReady { summary } => {
                Some(format!("patch set: {}", summary.join(", ")))
            }
            ResolverEvent::NoPatchesApplicable => {
                Some("no applicable patches for this hardware/OS".to_string())
            }
        },

        AppEvent::Gate(gate) => match gate {
            GateEvent::EvaluationStarted => None,
            GateEvent::BlockerFound {
                description,
                remediation,
            } => Some(format!("blocked: {description}\n  fix: {remediation}")),
            GateEvent::Passed => Some("security gate passed".to_string()),
            GateEvent::Blocked { count } => {
                Some(format!("refusing to patch: {count} blocker(s)"))
            }
        },

        AppEvent::Volume(volume) => match volume {
            VolumeEvent::MountStarted { device } => Some(format!("mounting {device}")),
            VolumeEvent::AlreadyMounted { mount_point } => Some(format!(
                "reusing existing mount at {}",
                mount_point.display()
            )),
            VolumeEvent::Mounted {
                device,
                mount_point,
            } => Some(format!("{device} mounted at {}", mount_point.display())),
            VolumeEvent::Unmounted { device } => Some(format!("{device} unmounted")),
            VolumeEvent::SealChecked { sealed } => Some(format!(
                "system volume seal: {}",
                if *sealed { "intact" } else { "broken" }
            )),
        },

        AppEvent::Backup(backup) => match backup {
            BackupEvent::BackupStarted { directory } => Some(format!("backing up {directory}")),
            BackupEvent::BackupCreated { directory } => Some(format!("backed up {directory}")),
            BackupEvent::BackupReused { directory } => {
                Some(format!("backup already exists for {directory}"))
            }
            BackupEvent::RestoreStarted { directory } => Some(format!("restoring {directory}")),
            BackupEvent::RestoreCompleted { directory } => Some(format!("restored {directory}")),
            BackupEvent::RestoreSkipped { directory } => {
                Some(format!("no archive for {directory}, skipped"))
            }
        },

        AppEvent::Patch(patch) => match patch {
            PatchEvent::PlanReady {
                operations,
                categories,
            } => Some(format!(
                "plan: {operations} operation(s) [{}]",
                categories.join(", ")
            )),
            PatchEvent::OperationStarted {
                index,
                total,
                description,
            } => Some(format!("[{index}/{total}] {description}")),
            PatchEvent::OperationCompleted { .. } => None,
            PatchEvent::OperationSkipped {
                description,
                reason,
            } => Some(format!("skipped {description} ({reason})")),
            PatchEvent::Completed { operations } => {
                Some(format!("applied {operations} operation(s)"))
            }
        },

        AppEvent::Seal(seal) => match seal {
            SealEvent::CacheRebuildStarted { tool } => {
                Some(format!("rebuilding kernel caches ({tool})"))
            }
            SealEvent::CacheRebuildCompleted { .. } => Some("kernel caches rebuilt".to_string()),
            SealEvent::SnapshotCreationStarted => Some("creating boot snapshot".to_string()),
            SealEvent::SnapshotCreated => Some("boot snapshot created".to_string()),
            SealEvent::SnapshotSkipped { reason } => Some(format!("snapshot skipped: {reason}")),
        },
    }
}
