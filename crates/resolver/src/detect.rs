//! Hardware and OS classification into a patch decision

use rootpatch_config::PatchPolicy;
use rootpatch_events::{AppEvent, EventEmitter, ResolverEvent};
use rootpatch_types::{GpuArch, HardwareProfile, MacosRelease, OsVersion, PatchDecision};

use crate::tables;

/// Monterey build whose beta still shipped the Kepler driver; the window
/// closed with the following beta.
const KEPLER_DROPPED_BUILD: &str = "21A5506j";

/// Classify the hardware profile against the running OS.
///
/// Pure and deterministic; emits progress events but never touches the
/// system. Absence of matches is a valid decision, not an error.
pub fn resolve(
    profile: &HardwareProfile,
    os: &OsVersion,
    policy: &PatchPolicy,
    emitter: &impl EventEmitter,
) -> PatchDecision {
    emitter.emit(AppEvent::Resolver(ResolverEvent::DetectionStarted));

    let mut decision = PatchDecision::default();

    // With the Mojave/Catalina acceleration stack, non-Metal GPUs stay
    // native one release longer.
    let non_metal_cutoff = if policy.moj_cat_accel {
        MacosRelease::HighSierra
    } else {
        MacosRelease::Catalina
    };

    for gpu in &profile.gpus {
        emitter.emit(AppEvent::Resolver(ResolverEvent::GpuDetected {
            vendor_id: gpu.vendor_id,
            device_id: gpu.device_id,
            arch: gpu.arch,
            active: gpu.is_active(),
        }));
        if !gpu.is_active() {
            continue;
        }
        match gpu.arch {
            GpuArch::NvidiaTesla | GpuArch::NvidiaFermi => {
                if os.release > non_metal_cutoff {
                    decision.nvidia_legacy = true;
                    decision.amfi_must_disable = true;
                }
            }
            GpuArch::NvidiaKepler => {
                // The driver was dropped during the 12.1 beta cycle; only
                // later builds need (and can use) the patch.
                if os.release > MacosRelease::BigSur
                    && os.release == MacosRelease::Monterey
                    && os.minor > 0
                    && !os.build.contains(KEPLER_DROPPED_BUILD)
                {
                    decision.kepler_gpu = true;
                    decision.supports_metal = true;
                }
            }
            GpuArch::AmdTeraScale1 => {
                if os.release > non_metal_cutoff {
                    decision.amd_ts1 = true;
                    decision.amfi_must_disable = true;
                }
            }
            GpuArch::AmdTeraScale2 => {
                if os.release > non_metal_cutoff {
                    decision.amd_ts2 = true;
                    decision.amfi_must_disable = true;
                }
            }
            GpuArch::IntelIronlake => {
                if os.release > non_metal_cutoff {
                    decision.iron_gpu = true;
                    decision.amfi_must_disable = true;
                }
            }
            GpuArch::IntelSandyBridge => {
                if os.release > non_metal_cutoff {
                    decision.sandy_gpu = true;
                    decision.amfi_must_disable = true;
                    decision.check_board_id = true;
                }
            }
            GpuArch::IntelIvyBridge => {
                if os.release > MacosRelease::BigSur {
                    decision.ivy_gpu = true;
                    decision.supports_metal = true;
                }
            }
            GpuArch::Unknown => {}
        }
    }

    // Metal-capable hardware always wins: never patch Metal and non-Metal
    // GPUs together (iMac12,x pairs a Sandy iGPU with a Kepler dGPU).
    if decision.supports_metal {
        decision.nvidia_legacy = false;
        decision.amd_ts1 = false;
        decision.amd_ts2 = false;
        decision.iron_gpu = false;
        decision.sandy_gpu = false;
    }

    if tables::LEGACY_BRIGHTNESS_MODELS.contains(&profile.model.as_str())
        && os.release > MacosRelease::Catalina
    {
        decision.brightness_legacy = true;
    }

    if os.release > MacosRelease::Catalina
        && (tables::BROKEN_GOP_AUDIO_MODELS.contains(&profile.model.as_str())
            || (tables::LEGACY_AUDIO_MODELS.contains(&profile.model.as_str())
                && !profile.applealc_loaded))
    {
        decision.legacy_audio = true;
    }

    if profile.wifi.is_legacy() && os.release > MacosRelease::BigSur {
        decision.legacy_wifi = true;
    }

    if tables::LEGACY_GMUX_MODELS.contains(&profile.model.as_str())
        && os.release > MacosRelease::HighSierra
        && profile.is_demuxed()
    {
        decision.legacy_gmux = true;
    }

    // Keyboard backlight restoration on Penryn MacBooks is explicitly
    // unsupported; the flag only exists so the plan format covers it.

    for line in decision.summary() {
        emitter.emit(AppEvent::Resolver(ResolverEvent::CategoryEnabled {
            category: line.to_string(),
        }));
    }
    if decision.no_patch() {
        emitter.emit(AppEvent::Resolver(ResolverEvent::NoPatchesApplicable));
    } else {
        emitter.emit(AppEvent::Resolver(ResolverEvent::DecisionReady {
            summary: decision.summary().iter().map(ToString::to_string).collect(),
        }));
    }

    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rootpatch_types::{Gpu, WifiChipset};

    fn profile(model: &str, gpus: Vec<Gpu>) -> HardwareProfile {
        HardwareProfile {
            model: model.to_string(),
            board_id: "Mac-F2268DC8".to_string(),
            gpus,
            wifi: WifiChipset::Modern,
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

    fn quiet() -> rootpatch_events::EventSender {
        rootpatch_events::channel().0
    }

    #[test]
    fn modern_hardware_resolves_to_no_patch() {
        let decision = resolve(
            &profile("Mac14,2", Vec::new()),
            &monterey(),
            &PatchPolicy::default(),
            &quiet(),
        );
        assert!(decision.no_patch());
    }

    #[test]
    fn tesla_on_big_sur_needs_amfi_disabled() {
        let p = profile(
            "MacBookPro5,1",
            vec![Gpu::new(0x10de, 0x0863, GpuArch::NvidiaTesla)],
        );
        let os = OsVersion {
            release: MacosRelease::BigSur,
            minor: 6,
            build: "20G165".to_string(),
        };
        let decision = resolve(&p, &os, &PatchPolicy::default(), &quiet());
        assert!(decision.nvidia_legacy);
        assert!(decision.amfi_must_disable);
        assert!(!decision.supports_metal);
    }

    #[test]
    fn tesla_on_mojave_only_patches_with_moj_cat_policy() {
        let p = profile(
            "MacBookPro5,1",
            vec![Gpu::new(0x10de, 0x0863, GpuArch::NvidiaTesla)],
        );
        let os = OsVersion {
            release: MacosRelease::Mojave,
            minor: 6,
            build: "18G103".to_string(),
        };
        assert!(resolve(&p, &os, &PatchPolicy::default(), &quiet()).no_patch());

        let policy = PatchPolicy {
            moj_cat_accel: true,
            ..PatchPolicy::default()
        };
        assert!(resolve(&p, &os, &policy, &quiet()).nvidia_legacy);
    }

    #[test]
    fn kepler_regression_window_excludes_dropped_build() {
        let p = profile(
            "iMac13,2",
            vec![Gpu::new(0x10de, 0x0fe1, GpuArch::NvidiaKepler)],
        );
        let mut os = monterey();
        assert!(resolve(&p, &os, &PatchPolicy::default(), &quiet()).kepler_gpu);

        os.build = "21A5506j".to_string();
        assert!(resolve(&p, &os, &PatchPolicy::default(), &quiet()).no_patch());

        os.build = "21A344".to_string();
        os.minor = 0;
        assert!(resolve(&p, &os, &PatchPolicy::default(), &quiet()).no_patch());
    }

    #[test]
    fn sandy_bridge_sets_board_id_check() {
        let p = profile(
            "iMac12,1",
            vec![Gpu::new(0x8086, 0x0126, GpuArch::IntelSandyBridge)],
        );
        let decision = resolve(&p, &monterey(), &PatchPolicy::default(), &quiet());
        assert!(decision.sandy_gpu);
        assert!(decision.check_board_id);
    }

    #[test]
    fn metal_gpu_clears_non_metal_categories() {
        // iMac12,x layout: Sandy iGPU plus Kepler dGPU
        let p = profile(
            "iMac12,2",
            vec![
                Gpu::new(0x8086, 0x0126, GpuArch::IntelSandyBridge),
                Gpu::new(0x10de, 0x0fe1, GpuArch::NvidiaKepler),
            ],
        );
        let decision = resolve(&p, &monterey(), &PatchPolicy::default(), &quiet());
        assert!(decision.kepler_gpu);
        assert!(!decision.sandy_gpu);
        assert!(decision.supports_metal);
    }

    #[test]
    fn disabled_gpu_is_ignored() {
        let mut gpu = Gpu::new(0x1002, 0x6741, GpuArch::AmdTeraScale2);
        gpu.class_code = Some(rootpatch_types::hardware::GPU_CLASS_CODE_DISABLED);
        let decision = resolve(
            &profile("MacBookPro8,2", vec![gpu]),
            &monterey(),
            &PatchPolicy::default(),
            &quiet(),
        );
        assert!(!decision.amd_ts2);
    }

    #[test]
    fn gmux_requires_demux() {
        let mut p = profile("MacBookPro8,2", Vec::new());
        p.has_integrated_gpu = true;
        let decision = resolve(&p, &monterey(), &PatchPolicy::default(), &quiet());
        assert!(decision.legacy_gmux);

        p.discrete_gpu = Some(Gpu::new(0x1002, 0x6741, GpuArch::AmdTeraScale2));
        let decision = resolve(&p, &monterey(), &PatchPolicy::default(), &quiet());
        assert!(!decision.legacy_gmux);
    }

    #[test]
    fn audio_patch_skipped_when_codec_injector_loaded() {
        let mut p = profile("MacBook5,2", Vec::new());
        p.applealc_loaded = true;
        let decision = resolve(&p, &monterey(), &PatchPolicy::default(), &quiet());
        assert!(!decision.legacy_audio);

        p.applealc_loaded = false;
        let decision = resolve(&p, &monterey(), &PatchPolicy::default(), &quiet());
        assert!(decision.legacy_audio);
    }

    proptest! {
        /// Whenever a Metal-capable GPU is active, no non-Metal graphics
        /// category may survive resolution.
        #[test]
        fn metal_priority_always_holds(
            archs in proptest::collection::vec(
                prop_oneof![
                    Just(GpuArch::NvidiaTesla),
                    Just(GpuArch::NvidiaFermi),
                    Just(GpuArch::NvidiaKepler),
                    Just(GpuArch::AmdTeraScale1),
                    Just(GpuArch::AmdTeraScale2),
                    Just(GpuArch::IntelIronlake),
                    Just(GpuArch::IntelSandyBridge),
                    Just(GpuArch::IntelIvyBridge),
                ],
                0..4,
            )
        ) {
            let gpus = archs
                .iter()
                .map(|arch| Gpu::new(0x1111, 0x2222, *arch))
                .collect();
            let decision = resolve(
                &profile("iMac12,2", gpus),
                &monterey(),
                &PatchPolicy::default(),
                &quiet(),
            );
            if decision.supports_metal {
                prop_assert!(!decision.any_legacy_gpu());
            }
        }
    }
}
