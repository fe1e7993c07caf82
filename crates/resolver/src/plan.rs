//! Expansion of a patch decision into the ordered operation plan
//!
//! Mirrors the category precedence contract: graphics kexts land before the
//! framework merges that assume them, TeraScale 2 extras come after both,
//! and the misc categories follow in fixed order. The builder pushes into
//! per-category buckets and a final stable sort enforces the precedence.

use std::path::PathBuf;

use rootpatch_config::{PatchPolicy, SANDY_BOARD_IDS_STOCK};
use rootpatch_types::{
    DefaultValue, HardwareProfile, MacosRelease, OsVersion, PatchCategory, PatchDecision,
    PatchOperation, PatchPlan, PayloadLayout, VolumeHandle,
};

use crate::tables::{self, family, overlay};

/// Build the ordered operation plan for one run.
///
/// Pure: consults only its arguments. Payload existence is the executor's
/// problem.
#[must_use]
pub fn build_plan(
    decision: &PatchDecision,
    os: &OsVersion,
    profile: &HardwareProfile,
    policy: &PatchPolicy,
    payloads: &PayloadLayout,
    volume: &VolumeHandle,
) -> PatchPlan {
    let mut builder = PlanBuilder {
        plan: PatchPlan::default(),
        os,
        policy,
        payloads,
        volume,
    };

    let accel = os.release.supports_legacy_accel();
    let mut added_legacy_kexts = false;

    if decision.nvidia_legacy {
        added_legacy_kexts |= accel;
        builder.nvidia_tesla();
    } else if decision.kepler_gpu {
        builder.nvidia_kepler();
    } else if decision.amd_ts1 {
        added_legacy_kexts |= accel;
        builder.amd_ts1();
    } else if decision.amd_ts2 {
        added_legacy_kexts |= accel;
        builder.amd_ts2();
    }

    if decision.iron_gpu {
        added_legacy_kexts |= accel;
        builder.intel_ironlake();
    } else if decision.sandy_gpu {
        added_legacy_kexts |= accel;
        builder.intel_sandy_bridge(&profile.board_id);
    } else if decision.ivy_gpu {
        builder.intel_ivy_bridge();
    }

    if added_legacy_kexts {
        builder.legacy_frameworks();
        if decision.amd_ts2 && policy.allow_ts2_accel {
            builder.ts2_extras();
        }
    }

    if decision.brightness_legacy {
        builder.brightness();
    }
    if decision.legacy_audio {
        builder.audio(&profile.model);
    }
    if decision.legacy_wifi {
        builder.wifi();
    }
    if decision.legacy_gmux {
        builder.gmux();
    }
    if decision.legacy_keyboard_backlight {
        builder.keyboard_backlight();
    }

    let mut plan = builder.plan;
    // Stable sort: category precedence between buckets, insertion order
    // within each.
    plan.operations.sort_by_key(|planned| planned.category);
    plan
}

struct PlanBuilder<'a> {
    plan: PatchPlan,
    os: &'a OsVersion,
    policy: &'a PatchPolicy,
    payloads: &'a PayloadLayout,
    volume: &'a VolumeHandle,
}

impl PlanBuilder<'_> {
    fn add_kexts(&mut self, fam: &str, names: &[&str]) {
        let dest = self.volume.extensions();
        for name in names {
            self.plan.push(
                PatchCategory::Graphics,
                PatchOperation::AddTree {
                    name: (*name).to_string(),
                    source: self.payloads.kext(fam, name),
                    dest_root: dest.clone(),
                },
            );
        }
    }

    fn delete_kexts(&mut self, names: &[&str]) {
        let dest = self.volume.extensions();
        for name in names {
            self.plan.push(
                PatchCategory::Graphics,
                PatchOperation::DeleteTree {
                    name: (*name).to_string(),
                    dest_root: dest.clone(),
                },
            );
        }
    }

    fn merge(
        &mut self,
        category: PatchCategory,
        overlay_name: &str,
        dest: PathBuf,
        normalize: &[&str],
    ) {
        self.plan.push(
            category,
            PatchOperation::MergeTree {
                source_root: self.payloads.overlay(overlay_name),
                dest_root: dest,
                normalize: normalize.iter().map(ToString::to_string).collect(),
            },
        );
    }

    fn general_accel(&mut self) {
        let names = match self.os.release {
            MacosRelease::Mojave => tables::ADD_GENERAL_ACCEL_MOJAVE,
            MacosRelease::Catalina => tables::ADD_GENERAL_ACCEL_CATALINA,
            MacosRelease::BigSur | MacosRelease::Monterey => tables::ADD_GENERAL_ACCEL,
            _ => return,
        };
        self.add_kexts(family::GENERAL, names);
    }

    fn nvidia_tesla(&mut self) {
        match self.os.release {
            MacosRelease::Mojave | MacosRelease::Catalina => {
                self.general_accel();
                self.add_kexts(family::NVIDIA_TESLA, tables::ADD_NVIDIA_ACCEL);
            }
            MacosRelease::BigSur | MacosRelease::Monterey => {
                self.delete_kexts(tables::DELETE_NVIDIA_ACCEL);
                self.general_accel();
                self.add_kexts(family::NVIDIA_TESLA, tables::ADD_NVIDIA_ACCEL);
                if self.os.release == MacosRelease::Monterey && self.os.minor > 0 {
                    // 12.1+ betas dropped NVDAStartup from the OS
                    self.add_kexts(family::NVIDIA_KEPLER, tables::ADD_NVIDIA_TESLA_STARTUP);
                }
            }
            _ => self.add_kexts(family::NVIDIA_TESLA, tables::ADD_NVIDIA_BRIGHTNESS),
        }
    }

    fn nvidia_kepler(&mut self) {
        self.add_kexts(family::NVIDIA_KEPLER, tables::ADD_NVIDIA_KEPLER_ACCEL);
        if self.os.release == MacosRelease::Monterey {
            self.merge(
                PatchCategory::GraphicsFrameworks,
                overlay::FRAMEWORKS_ACCEL_KEPLER,
                self.volume.frameworks(),
                &[],
            );
        }
    }

    fn amd_ts1(&mut self) {
        match self.os.release {
            MacosRelease::Mojave | MacosRelease::Catalina => {
                self.general_accel();
                self.add_kexts(family::AMD_TERASCALE, tables::ADD_AMD_ACCEL);
            }
            MacosRelease::BigSur | MacosRelease::Monterey => {
                self.delete_kexts(tables::DELETE_AMD_ACCEL);
                self.general_accel();
                self.add_kexts(family::AMD_TERASCALE, tables::ADD_AMD_ACCEL);
            }
            _ => self.add_kexts(family::AMD_TERASCALE, tables::ADD_AMD_BRIGHTNESS),
        }
    }

    fn amd_ts2(&mut self) {
        if !self.policy.allow_ts2_accel || !self.os.release.supports_legacy_accel() {
            // Unstable on sleep/wake; the framebuffer-only set is the default
            self.add_kexts(family::AMD_TERASCALE, tables::ADD_AMD_BRIGHTNESS);
            return;
        }
        match self.os.release {
            MacosRelease::Mojave | MacosRelease::Catalina => {
                self.general_accel();
                self.add_kexts(family::AMD_TERASCALE, tables::ADD_AMD_ACCEL);
            }
            _ => {
                self.delete_kexts(tables::DELETE_AMD_ACCEL);
                self.delete_kexts(tables::DELETE_AMD_ACCEL_TS2);
                self.general_accel();
                self.add_kexts(family::AMD_TERASCALE, tables::ADD_AMD_ACCEL);
            }
        }
    }

    fn intel_ironlake(&mut self) {
        match self.os.release {
            MacosRelease::Mojave | MacosRelease::Catalina => {
                self.general_accel();
                self.add_kexts(family::INTEL_GEN1, tables::ADD_INTEL_GEN1_ACCEL);
            }
            MacosRelease::BigSur | MacosRelease::Monterey => {
                self.delete_kexts(tables::DELETE_NVIDIA_ACCEL);
                self.general_accel();
                self.add_kexts(family::INTEL_GEN1, tables::ADD_INTEL_GEN1_ACCEL);
            }
            _ => self.add_kexts(family::INTEL_GEN1, tables::ADD_INTEL_GEN1_ACCEL),
        }
    }

    fn intel_sandy_bridge(&mut self, board_id: &str) {
        match self.os.release {
            MacosRelease::Mojave | MacosRelease::Catalina => {
                self.general_accel();
                self.add_kexts(family::INTEL_GEN2, tables::ADD_INTEL_GEN2_ACCEL);
                self.sandy_framebuffer(board_id);
            }
            MacosRelease::BigSur | MacosRelease::Monterey => {
                self.delete_kexts(tables::DELETE_NVIDIA_ACCEL);
                self.general_accel();
                self.add_kexts(family::INTEL_GEN2, tables::ADD_INTEL_GEN2_ACCEL);
                self.sandy_framebuffer(board_id);
                self.merge(
                    PatchCategory::GraphicsFrameworks,
                    overlay::PRIVATE_FRAMEWORKS_DRM,
                    self.volume.private_frameworks(),
                    &[],
                );
            }
            _ => {
                self.add_kexts(family::INTEL_GEN2, tables::ADD_INTEL_GEN2_ACCEL);
                self.sandy_framebuffer(board_id);
            }
        }
    }

    /// Stock board ids run the unmodified framebuffer; spoofed ones need the
    /// board-id-patched binary. Either way the installed name is the stock
    /// one.
    fn sandy_framebuffer(&mut self, board_id: &str) {
        let dest = self.volume.extensions();
        self.plan.push(
            PatchCategory::Graphics,
            PatchOperation::DeleteTree {
                name: tables::INTEL_SNB_FRAMEBUFFER_CLEAN.to_string(),
                dest_root: dest.clone(),
            },
        );
        let source_name = if SANDY_BOARD_IDS_STOCK.contains(&board_id) {
            tables::INTEL_SNB_FRAMEBUFFER_CLEAN
        } else {
            tables::INTEL_SNB_FRAMEBUFFER
        };
        self.plan.push(
            PatchCategory::Graphics,
            PatchOperation::AddTree {
                name: tables::INTEL_SNB_FRAMEBUFFER.to_string(),
                source: self.payloads.kext(family::INTEL_GEN2, source_name),
                dest_root: dest,
            },
        );
    }

    fn intel_ivy_bridge(&mut self) {
        self.add_kexts(family::INTEL_GEN3, tables::ADD_INTEL_GEN3_ACCEL);
        if self.os.release == MacosRelease::Monterey {
            self.plan.push(
                PatchCategory::Graphics,
                PatchOperation::WriteDefault {
                    domain: "com.apple.coremedia".to_string(),
                    key: "hardwareVideoDecoder".to_string(),
                    value: DefaultValue::Str("enable".to_string()),
                },
            );
            self.merge(
                PatchCategory::GraphicsFrameworks,
                overlay::FRAMEWORKS_ACCEL_IVY,
                self.volume.frameworks(),
                &[],
            );
            self.merge(
                PatchCategory::GraphicsFrameworks,
                overlay::PRIVATE_FRAMEWORKS_ACCEL_IVY,
                self.volume.private_frameworks(),
                &[],
            );
        }
    }

    /// Framework overlays shared by every non-Metal acceleration set.
    fn legacy_frameworks(&mut self) {
        if self.os.release == MacosRelease::Monterey {
            self.merge(
                PatchCategory::GraphicsFrameworks,
                overlay::SKYLIGHT_DROPBOX,
                self.volume.application_support(),
                &[],
            );
        }
        self.merge(
            PatchCategory::GraphicsFrameworks,
            overlay::FRAMEWORKS_ACCEL,
            self.volume.frameworks(),
            &[],
        );
        if self.os.release > MacosRelease::BigSur {
            // WebKit regressed against the legacy stack in 12.0
            self.merge(
                PatchCategory::GraphicsFrameworks,
                overlay::FRAMEWORKS_ACCEL_IVY,
                self.volume.frameworks(),
                &[],
            );
        }
        self.merge(
            PatchCategory::GraphicsFrameworks,
            overlay::PRIVATE_FRAMEWORKS_ACCEL,
            self.volume.private_frameworks(),
            &[],
        );
        if self.os.release > MacosRelease::Catalina {
            // Superseded by the SkyLight set; stale copies break input
            self.plan.push(
                PatchCategory::GraphicsFrameworks,
                PatchOperation::DeleteTree {
                    name: "IOHID-Fixup.plist".to_string(),
                    dest_root: self.volume.launch_daemons(),
                },
            );
        } else {
            self.plan.push(
                PatchCategory::GraphicsFrameworks,
                PatchOperation::WriteDefault {
                    domain: "/Library/Preferences/com.apple.security.libraryvalidation.plist"
                        .to_string(),
                    key: "DisableLibraryValidation".to_string(),
                    value: DefaultValue::Bool(true),
                },
            );
        }
    }

    /// TeraScale 2 bits that must land after the Intel HD3000 set.
    fn ts2_extras(&mut self) {
        let dest = self.volume.extensions();
        for name in tables::ADD_AMD_ACCEL_TS2 {
            self.plan.push(
                PatchCategory::GraphicsTs2Extras,
                PatchOperation::AddTree {
                    name: (*name).to_string(),
                    source: self.payloads.kext(family::AMD_TERASCALE_2, name),
                    dest_root: dest.clone(),
                },
            );
        }
        self.merge(
            PatchCategory::GraphicsTs2Extras,
            overlay::FRAMEWORKS_ACCEL_TS2,
            self.volume.frameworks(),
            &[],
        );
        self.merge(
            PatchCategory::GraphicsTs2Extras,
            overlay::PRIVATE_FRAMEWORKS_ACCEL_TS2,
            self.volume.private_frameworks(),
            &[],
        );
        self.plan.push(
            PatchCategory::GraphicsTs2Extras,
            PatchOperation::WriteDefault {
                domain: "com.apple.cmio".to_string(),
                key: "CMIO_Unit_Input_ASC.DoNotUseOpenCL".to_string(),
                value: DefaultValue::Bool(true),
            },
        );
    }

    fn brightness(&mut self) {
        let dest = self.volume.extensions();
        for name in tables::DELETE_BRIGHTNESS {
            self.plan.push(
                PatchCategory::Brightness,
                PatchOperation::DeleteTree {
                    name: (*name).to_string(),
                    dest_root: dest.clone(),
                },
            );
        }
        for name in tables::ADD_BRIGHTNESS {
            self.plan.push(
                PatchCategory::Brightness,
                PatchOperation::AddTree {
                    name: (*name).to_string(),
                    source: self.payloads.kext(family::BRIGHTNESS, name),
                    dest_root: dest.clone(),
                },
            );
        }
        self.merge(
            PatchCategory::Brightness,
            overlay::PRIVATE_FRAMEWORKS_BRIGHTNESS,
            self.volume.private_frameworks(),
            &["DisplayServices.framework"],
        );
    }

    fn audio(&mut self, model: &str) {
        let dest = self.volume.extensions();
        if tables::BROKEN_GOP_AUDIO_MODELS.contains(&model) {
            for name in tables::DELETE_VOLUME_CONTROL {
                self.plan.push(
                    PatchCategory::Audio,
                    PatchOperation::DeleteTree {
                        name: (*name).to_string(),
                        dest_root: dest.clone(),
                    },
                );
            }
            for name in tables::ADD_VOLUME_CONTROL {
                self.plan.push(
                    PatchCategory::Audio,
                    PatchOperation::AddTree {
                        name: (*name).to_string(),
                        source: self.payloads.kext(family::AUDIO, name),
                        dest_root: dest.clone(),
                    },
                );
            }
        } else {
            for name in tables::ADD_VOLUME_CONTROL_V2 {
                self.plan.push(
                    PatchCategory::Audio,
                    PatchOperation::AddTree {
                        name: (*name).to_string(),
                        source: self.payloads.kext(family::AUDIO_V2, name),
                        dest_root: dest.clone(),
                    },
                );
            }
        }
    }

    fn wifi(&mut self) {
        self.merge(
            PatchCategory::Wifi,
            overlay::CORESERVICES_WIFI,
            self.volume.core_services(),
            &["WiFiAgent.app"],
        );
        self.merge(
            PatchCategory::Wifi,
            overlay::LIBEXEC_WIFI,
            self.volume.libexec(),
            &["airportd"],
        );
        // Password-prompt crash fix; harmless on Metal machines
        self.merge(
            PatchCategory::Wifi,
            overlay::SKYLIGHT_WIFI,
            self.volume.application_support(),
            &[],
        );
    }

    fn gmux(&mut self) {
        let dest = self.volume.mux_plugins();
        self.plan.push(
            PatchCategory::Gmux,
            PatchOperation::DeleteTree {
                name: tables::MUX_KEXT.to_string(),
                dest_root: dest.clone(),
            },
        );
        self.plan.push(
            PatchCategory::Gmux,
            PatchOperation::AddTree {
                name: tables::MUX_KEXT.to_string(),
                source: self.payloads.kext(family::MUX, tables::MUX_KEXT),
                dest_root: dest,
            },
        );
    }

    fn keyboard_backlight(&mut self) {
        self.merge(
            PatchCategory::KeyboardBacklight,
            overlay::SKYLIGHT_KEYBOARD_BACKLIGHT,
            self.volume.application_support(),
            &[],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootpatch_types::{PatchOperation, VolumeVariant};

    fn volume() -> VolumeHandle {
        VolumeHandle {
            device: "disk1s5".to_string(),
            mount_point: PathBuf::from("/System/Volumes/Update/mnt1"),
            data_root: PathBuf::from("/"),
            freshly_mounted: true,
            variant: VolumeVariant::SnapshotSealed,
        }
    }

    fn profile(board_id: &str) -> HardwareProfile {
        HardwareProfile {
            model: "iMac12,2".to_string(),
            board_id: board_id.to_string(),
            gpus: Vec::new(),
            wifi: rootpatch_types::WifiChipset::None,
            discrete_gpu: None,
            has_integrated_gpu: false,
            boot_args: String::new(),
            applealc_loaded: false,
        }
    }

    fn monterey() -> OsVersion {
        OsVersion {
            release: MacosRelease::Monterey,
            minor: 1,
            build: "21C52".to_string(),
        }
    }

    fn payloads() -> PayloadLayout {
        PayloadLayout::new("/var/payloads")
    }

    fn plan_for(decision: &PatchDecision, os: &OsVersion, policy: &PatchPolicy) -> PatchPlan {
        build_plan(
            decision,
            os,
            &profile("Mac-F2268DC8"),
            policy,
            &payloads(),
            &volume(),
        )
    }

    fn added_names(plan: &PatchPlan) -> Vec<&str> {
        plan.operations
            .iter()
            .filter_map(|p| match &p.operation {
                PatchOperation::AddTree { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_decision_builds_empty_plan() {
        let plan = plan_for(
            &PatchDecision::default(),
            &monterey(),
            &PatchPolicy::default(),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn plans_are_always_category_ordered() {
        let decision = PatchDecision {
            nvidia_legacy: true,
            amd_ts2: true,
            brightness_legacy: true,
            legacy_audio: true,
            legacy_wifi: true,
            legacy_gmux: true,
            ..PatchDecision::default()
        };
        let policy = PatchPolicy {
            allow_ts2_accel: true,
            ..PatchPolicy::default()
        };
        let plan = plan_for(&decision, &monterey(), &policy);
        assert!(plan.is_ordered());
        assert!(!plan.is_empty());
    }

    #[test]
    fn kexts_install_before_framework_merges() {
        let decision = PatchDecision {
            nvidia_legacy: true,
            ..PatchDecision::default()
        };
        let plan = plan_for(&decision, &monterey(), &PatchPolicy::default());
        let first_merge = plan
            .operations
            .iter()
            .position(|p| matches!(p.operation, PatchOperation::MergeTree { .. }))
            .unwrap();
        let last_add = plan
            .operations
            .iter()
            .rposition(|p| {
                matches!(p.operation, PatchOperation::AddTree { .. })
                    && p.category == PatchCategory::Graphics
            })
            .unwrap();
        assert!(last_add < first_merge);
    }

    #[test]
    fn ts2_acceleration_needs_explicit_policy_opt_in() {
        let decision = PatchDecision {
            amd_ts2: true,
            ..PatchDecision::default()
        };
        let plan = plan_for(&decision, &monterey(), &PatchPolicy::default());
        let names = added_names(&plan);
        assert!(names.contains(&"AMDLegacyFramebuffer.kext"));
        assert!(!names.contains(&"AMDRadeonX2000.kext"));
        assert!(!names.contains(&"AMDRadeonX3000.kext"));

        let policy = PatchPolicy {
            allow_ts2_accel: true,
            ..PatchPolicy::default()
        };
        let plan = plan_for(&decision, &monterey(), &policy);
        let names = added_names(&plan);
        assert!(names.contains(&"AMDRadeonX2000.kext"));
        assert!(names.contains(&"AMDRadeonX3000.kext"));
    }

    #[test]
    fn sandy_framebuffer_source_depends_on_board_id() {
        let decision = PatchDecision {
            sandy_gpu: true,
            ..PatchDecision::default()
        };
        let stock = build_plan(
            &decision,
            &monterey(),
            &profile("Mac-942B5BF58194151B"),
            &PatchPolicy::default(),
            &payloads(),
            &volume(),
        );
        let spoofed_source = stock
            .operations
            .iter()
            .find_map(|p| match &p.operation {
                PatchOperation::AddTree { name, source, .. }
                    if name == "AppleIntelSNBGraphicsFB.kext" =>
                {
                    Some(source.clone())
                }
                _ => None,
            })
            .unwrap();
        assert!(spoofed_source.ends_with("AppleIntelSNBGraphicsFB.kext"));

        let stock = build_plan(
            &decision,
            &monterey(),
            &profile("Mac-94245B3640C91C81"),
            &PatchPolicy::default(),
            &payloads(),
            &volume(),
        );
        let stock_source = stock
            .operations
            .iter()
            .find_map(|p| match &p.operation {
                PatchOperation::AddTree { name, source, .. }
                    if name == "AppleIntelSNBGraphicsFB.kext" =>
                {
                    Some(source.clone())
                }
                _ => None,
            })
            .unwrap();
        assert!(stock_source.ends_with("AppleIntelSNBGraphicsFB-Clean.kext"));
    }

    #[test]
    fn pre_big_sur_disables_library_validation_instead_of_stripping_fixup() {
        let decision = PatchDecision {
            nvidia_legacy: true,
            ..PatchDecision::default()
        };
        let catalina = OsVersion {
            release: MacosRelease::Catalina,
            minor: 7,
            build: "19H15".to_string(),
        };
        let plan = plan_for(&decision, &catalina, &PatchPolicy::default());
        assert!(plan.operations.iter().any(|p| matches!(
            &p.operation,
            PatchOperation::WriteDefault { key, .. } if key == "DisableLibraryValidation"
        )));

        let plan = plan_for(&decision, &monterey(), &PatchPolicy::default());
        assert!(plan.operations.iter().any(|p| matches!(
            &p.operation,
            PatchOperation::DeleteTree { name, .. } if name == "IOHID-Fixup.plist"
        )));
    }

    #[test]
    fn wifi_merges_touch_three_destinations() {
        let decision = PatchDecision {
            legacy_wifi: true,
            ..PatchDecision::default()
        };
        let plan = plan_for(&decision, &monterey(), &PatchPolicy::default());
        let dests: Vec<_> = plan
            .operations
            .iter()
            .filter_map(|p| match &p.operation {
                PatchOperation::MergeTree { dest_root, .. } => Some(dest_root.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(dests.len(), 3);
        assert!(dests[0].ends_with("CoreServices"));
        assert!(dests[1].ends_with("libexec"));
        assert!(dests[2].ends_with("Application Support"));
    }
}
