#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Security gate for rootpatch
//!
//! One pure check: given the patch decision and a fresh security posture
//! snapshot, decide whether mutating the root volume is allowed. Every
//! check runs independently so the operator sees all blockers at once
//! instead of fixing them one reboot at a time. The gate never remediates
//! anything itself.

use rootpatch_config::{PatchPolicy, SANDY_BOARD_IDS};
use rootpatch_events::{AppEvent, EventEmitter, GateEvent};
use rootpatch_platform::{SIP_PATCH_MASK_LEGACY, SIP_PATCH_MASK_SNAPSHOT};
use rootpatch_types::{OsVersion, PatchDecision, SecurityState};
use serde::{Deserialize, Serialize};

/// One reason patching is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Blocker {
    SipEnabled { required_bits: u32 },
    SecureBootEnabled,
    FileVaultEnabled,
    AmfiEnabled,
    BoardIdUnsupported { board_id: String },
    ForeignPatcherDetected,
}

impl Blocker {
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::SipEnabled { required_bits } => format!(
                "System Integrity Protection blocks root patching (csr-active-config needs {required_bits:#x})"
            ),
            Self::SecureBootEnabled => "Full secure boot is active".to_string(),
            Self::FileVaultEnabled => "FileVault is enabled on the root volume".to_string(),
            Self::AmfiEnabled => {
                "AMFI is enforcing signatures on kexts this patch set must load".to_string()
            }
            Self::BoardIdUnsupported { board_id } => {
                format!("board id {board_id} is not supported by the Sandy Bridge framebuffer")
            }
            Self::ForeignPatcherDetected => {
                "the root volume was already modified by a different patcher".to_string()
            }
        }
    }

    #[must_use]
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::SipEnabled { .. } => {
                "Lower SIP: run 'csrutil disable' (and 'csrutil authenticated-root disable' on snapshot-based systems) in RecoveryOS."
            }
            Self::SecureBootEnabled => {
                "Set Startup Security to No Security / disable the SecureBootModel."
            }
            Self::FileVaultEnabled => "Disable FileVault, or enable the allow_fv_root policy.",
            Self::AmfiEnabled => "Add amfi_get_out_of_my_way=1 to boot-args.",
            Self::BoardIdUnsupported { .. } => {
                "Spoof a supported Sandy Bridge board id before patching."
            }
            Self::ForeignPatcherDetected => {
                "Start from a clean install; mixing patchers corrupts the volume."
            }
        }
    }
}

/// Result of one gate evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub blockers: Vec<Blocker>,
}

impl GateReport {
    #[must_use]
    pub fn allowed(&self) -> bool {
        self.blockers.is_empty()
    }
}

/// Evaluate every check; nothing short-circuits.
pub fn evaluate(
    decision: &PatchDecision,
    state: &SecurityState,
    os: &OsVersion,
    policy: &PatchPolicy,
    emitter: &impl EventEmitter,
) -> GateReport {
    emitter.emit(AppEvent::Gate(GateEvent::EvaluationStarted));
    let mut report = GateReport::default();

    if state.sip_enabled {
        let required_bits = if os.release.uses_snapshots() {
            SIP_PATCH_MASK_SNAPSHOT
        } else {
            SIP_PATCH_MASK_LEGACY
        };
        report.blockers.push(Blocker::SipEnabled { required_bits });
    }
    if state.secure_boot_enabled {
        report.blockers.push(Blocker::SecureBootEnabled);
    }
    if state.filevault_enabled && !policy.allow_fv_root {
        report.blockers.push(Blocker::FileVaultEnabled);
    }
    if state.amfi_enabled && decision.amfi_must_disable {
        report.blockers.push(Blocker::AmfiEnabled);
    }
    if decision.check_board_id && !SANDY_BOARD_IDS.contains(&state.board_id.as_str()) {
        report.blockers.push(Blocker::BoardIdUnsupported {
            board_id: state.board_id.clone(),
        });
    }
    if state.foreign_patcher_detected {
        report.blockers.push(Blocker::ForeignPatcherDetected);
    }

    for blocker in &report.blockers {
        emitter.emit(AppEvent::Gate(GateEvent::BlockerFound {
            description: blocker.description(),
            remediation: blocker.remediation().to_string(),
        }));
    }
    if report.allowed() {
        emitter.emit(AppEvent::Gate(GateEvent::Passed));
    } else {
        emitter.emit(AppEvent::Gate(GateEvent::Blocked {
            count: report.blockers.len(),
        }));
    }

    report
}
