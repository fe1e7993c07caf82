//! The sequential patch / unpatch state machine

use std::path::PathBuf;
use std::sync::Arc;

use rootpatch_config::Config;
use rootpatch_errors::{Error, OpsError, PatchError, SealError};
use rootpatch_events::{AppEvent, EventEmitter, EventSender, StageEvent};
use rootpatch_guard::GateReport;
use rootpatch_platform::{probe_security_state, ToolRunner};
use rootpatch_types::{
    HardwareProfile, MacosRelease, OsVersion, PatchDecision, PayloadLayout, SecurityState,
    VolumeHandle, VolumeVariant,
};
use serde::Serialize;

use crate::outcome::{PatchOutcome, UnpatchOutcome};

/// Everything `status` reports in one probe pass.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub decision: PatchDecision,
    pub security: SecurityState,
    pub gate: GateReport,
    /// Seal state of the system volume; `None` on pre-snapshot systems.
    pub sealed: Option<bool>,
}

/// Builder for [`Orchestrator`]. Every component except `system_root` is
/// required; a missing one is a programming error surfaced as
/// [`OpsError::MissingComponent`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<Config>,
    os: Option<OsVersion>,
    profile: Option<HardwareProfile>,
    payloads: Option<PayloadLayout>,
    runner: Option<Arc<dyn ToolRunner>>,
    event_sender: Option<EventSender>,
    system_root: Option<PathBuf>,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn os(mut self, os: OsVersion) -> Self {
        self.os = Some(os);
        self
    }

    #[must_use]
    pub fn profile(mut self, profile: HardwareProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    #[must_use]
    pub fn payloads(mut self, payloads: PayloadLayout) -> Self {
        self.payloads = Some(payloads);
        self
    }

    #[must_use]
    pub fn runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    #[must_use]
    pub fn event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Root the live-system probes somewhere other than `/`. Tests point
    /// this at their sandbox.
    #[must_use]
    pub fn system_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.system_root = Some(root.into());
        self
    }

    pub fn build(self) -> Result<Orchestrator, Error> {
        Ok(Orchestrator {
            config: self.config.ok_or_else(|| missing("config"))?,
            os: self.os.ok_or_else(|| missing("os version"))?,
            profile: self.profile.ok_or_else(|| missing("hardware profile"))?,
            payloads: self.payloads.ok_or_else(|| missing("payload layout"))?,
            runner: self.runner.ok_or_else(|| missing("tool runner"))?,
            tx: self.event_sender.ok_or_else(|| missing("event sender"))?,
            system_root: self.system_root.unwrap_or_else(|| PathBuf::from("/")),
        })
    }
}

fn missing(component: &str) -> Error {
    OpsError::MissingComponent {
        component: component.to_string(),
    }
    .into()
}

/// Drives the patch and unpatch workflows stage by stage, strictly
/// sequentially. One orchestrator handles one invocation; nothing is cached
/// across runs.
pub struct Orchestrator {
    config: Config,
    os: OsVersion,
    profile: HardwareProfile,
    payloads: PayloadLayout,
    runner: Arc<dyn ToolRunner>,
    tx: EventSender,
    system_root: PathBuf,
}

impl EventEmitter for Orchestrator {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

impl Orchestrator {
    /// Resolve, gate, mount, back up, apply and seal.
    pub async fn patch(&self) -> Result<PatchOutcome, Error> {
        let decision = self.resolve_stage();
        if decision.no_patch() {
            return Ok(PatchOutcome::NoPatchNeeded);
        }

        let report = self.gate_stage(&decision).await?;
        if !report.allowed() {
            return Ok(PatchOutcome::Blocked {
                blockers: report.blockers,
            });
        }

        let handle = match self.mount_stage().await? {
            Ok(handle) => handle,
            Err(detail) => return Ok(PatchOutcome::MountFailed { detail }),
        };

        self.enter("backup");
        let sealed = if self.os.release == MacosRelease::BigSur {
            rootpatch_volume::check_seal(self.runner.as_ref(), self).await?
        } else {
            false
        };
        rootpatch_patch::backup_if_needed(self.runner.as_ref(), &handle, &self.os, sealed, self)
            .await?;
        self.complete("backup");

        self.enter("patch");
        let plan = rootpatch_resolver::build_plan(
            &decision,
            &self.os,
            &self.profile,
            &self.config.policy,
            &self.payloads,
            &handle,
        );
        if let Err(error) = rootpatch_patch::apply_plan(&plan, self.runner.as_ref(), self).await {
            return match error {
                Error::Patch(PatchError::OperationFailed {
                    description,
                    diagnostic,
                }) => Ok(PatchOutcome::PatchFailed {
                    operation: description,
                    diagnostic,
                }),
                other => Err(other),
            };
        }
        self.complete("patch");

        self.enter("seal");
        if let Err(error) = rootpatch_volume::seal(self.runner.as_ref(), &handle, &self.os, self).await
        {
            return match error {
                Error::Seal(seal_error) => Ok(PatchOutcome::SealFailed {
                    diagnostic: seal_diagnostic(&seal_error),
                }),
                other => Err(other),
            };
        }
        self.complete("seal");

        if decision.amd_ts2 && self.config.policy.allow_ts2_accel {
            self.emit_warning(
                "TeraScale 2 acceleration can colour-strobe after wake; reboot to clear it",
            );
        }
        Ok(PatchOutcome::Success)
    }

    /// Gate, mount, then revert: native sealed-snapshot restore where the
    /// volume variant supports it, manual archive restore otherwise.
    pub async fn unpatch(&self) -> Result<UnpatchOutcome, Error> {
        let decision = self.resolve_stage();

        let report = self.gate_stage(&decision).await?;
        if !report.allowed() {
            return Ok(UnpatchOutcome::Blocked {
                blockers: report.blockers,
            });
        }

        let handle = match self.mount_stage().await? {
            Ok(handle) => handle,
            Err(detail) => return Ok(UnpatchOutcome::MountFailed { detail }),
        };

        self.enter("revert");
        if handle.variant == VolumeVariant::SnapshotSealed {
            let native = rootpatch_volume::revert_to_sealed_snapshot(
                self.runner.as_ref(),
                &handle,
                self,
            )
            .await?;
            if native == rootpatch_volume::NativeRevert::Reverted {
                rootpatch_volume::unmount(self.runner.as_ref(), &handle, self).await;
                self.complete("revert");
                return Ok(UnpatchOutcome::RevertedNatively);
            }
        }

        if !rootpatch_patch::has_backup(self.runner.as_ref(), &handle) {
            return Ok(UnpatchOutcome::RevertUnavailable);
        }
        let reverts =
            rootpatch_patch::restore_backup(self.runner.as_ref(), &handle, self).await?;
        self.complete("revert");

        self.enter("seal");
        if let Err(error) = rootpatch_volume::seal(self.runner.as_ref(), &handle, &self.os, self).await
        {
            return match error {
                Error::Seal(seal_error) => Ok(UnpatchOutcome::SealFailed {
                    diagnostic: seal_diagnostic(&seal_error),
                }),
                other => Err(other),
            };
        }
        self.complete("seal");

        Ok(UnpatchOutcome::RevertedManually { reverts })
    }

    /// Probe everything without mutating anything.
    pub async fn status(&self) -> Result<StatusReport, Error> {
        let decision = self.resolve_stage();
        let security = probe_security_state(
            self.runner.as_ref(),
            &self.os,
            &self.profile,
            &self.system_root,
        )
        .await?;
        let gate = rootpatch_guard::evaluate(
            &decision,
            &security,
            &self.os,
            &self.config.policy,
            self,
        );
        let sealed = if self.os.release.uses_snapshots() {
            Some(rootpatch_volume::check_seal(self.runner.as_ref(), self).await?)
        } else {
            None
        };
        Ok(StatusReport {
            decision,
            security,
            gate,
            sealed,
        })
    }

    fn resolve_stage(&self) -> PatchDecision {
        self.enter("resolve");
        let decision =
            rootpatch_resolver::resolve(&self.profile, &self.os, &self.config.policy, self);
        self.complete("resolve");
        decision
    }

    async fn gate_stage(&self, decision: &PatchDecision) -> Result<GateReport, Error> {
        self.enter("gate");
        let security = probe_security_state(
            self.runner.as_ref(),
            &self.os,
            &self.profile,
            &self.system_root,
        )
        .await?;
        let report = rootpatch_guard::evaluate(
            decision,
            &security,
            &self.os,
            &self.config.policy,
            self,
        );
        self.complete("gate");
        Ok(report)
    }

    /// Mount failure is an outcome, not an error: the operator gets reboot
    /// advice and a distinct exit code.
    async fn mount_stage(&self) -> Result<Result<VolumeHandle, String>, Error> {
        self.enter("mount");
        let mounted = rootpatch_volume::mount(
            self.runner.as_ref(),
            &self.os,
            &self.config.volume.mount_point,
            self,
        )
        .await;
        match mounted {
            Ok(handle) => {
                self.complete("mount");
                Ok(Ok(handle))
            }
            Err(Error::Volume(volume_error)) => Ok(Err(volume_error.to_string())),
            Err(other) => Err(other),
        }
    }

    fn enter(&self, stage: &str) {
        self.emit(AppEvent::Stage(StageEvent::Entered {
            stage: stage.to_string(),
        }));
    }

    fn complete(&self, stage: &str) {
        self.emit(AppEvent::Stage(StageEvent::Completed {
            stage: stage.to_string(),
        }));
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("os", &self.os)
            .field("model", &self.profile.model)
            .field("system_root", &self.system_root)
            .finish_non_exhaustive()
    }
}

fn seal_diagnostic(error: &SealError) -> String {
    match error {
        SealError::CacheRebuildFailed { diagnostic }
        | SealError::SnapshotCreationFailed { diagnostic, .. } => diagnostic.clone(),
    }
}
