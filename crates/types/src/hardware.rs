//! Hardware profile supplied by the external hardware provider
//!
//! The profile is immutable per run. rootpatch never probes hardware itself;
//! the provider hands over everything the resolver needs, including the
//! result of the live kext-loaded check it performs on our behalf.

use serde::{Deserialize, Serialize};

/// GPU class code used by firmware to mark a disabled device.
pub const GPU_CLASS_CODE_DISABLED: u32 = 0xFFFF_FFFF;

/// Known GPU architecture families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuArch {
    NvidiaTesla,
    NvidiaFermi,
    NvidiaKepler,
    AmdTeraScale1,
    AmdTeraScale2,
    IntelIronlake,
    IntelSandyBridge,
    IntelIvyBridge,
    Unknown,
}

impl GpuArch {
    /// Kepler and Ivy Bridge are the Metal-capable families this tool still
    /// patches; when one is present it always wins over non-Metal hardware.
    #[must_use]
    pub fn is_metal_capable(self) -> bool {
        matches!(self, Self::NvidiaKepler | Self::IntelIvyBridge)
    }
}

/// One detected GPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gpu {
    pub vendor_id: u32,
    pub device_id: u32,
    /// `None` when the device exposes no class code; `0xFFFFFFFF` means the
    /// device was disabled by firmware (demuxed machines).
    pub class_code: Option<u32>,
    pub arch: GpuArch,
}

impl Gpu {
    #[must_use]
    pub fn new(vendor_id: u32, device_id: u32, arch: GpuArch) -> Self {
        Self {
            vendor_id,
            device_id,
            class_code: Some(0),
            arch,
        }
    }

    /// A GPU is active when it carries a class code other than the firmware
    /// disabled marker.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.class_code, Some(code) if code != GPU_CLASS_CODE_DISABLED)
    }
}

/// Wi-Fi chipset identity as reported by the hardware provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WifiChipset {
    BroadcomBrcm4331,
    BroadcomBrcm43224,
    AtherosAirPort40,
    Modern,
    #[default]
    None,
}

impl WifiChipset {
    /// Chipsets whose drivers were dropped and need root patches.
    #[must_use]
    pub fn is_legacy(self) -> bool {
        matches!(
            self,
            Self::BroadcomBrcm4331 | Self::BroadcomBrcm43224 | Self::AtherosAirPort40
        )
    }
}

/// Immutable hardware description for the machine being patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Model identifier, e.g. `MacBookPro8,2`.
    pub model: String,
    /// Reported board id, e.g. `Mac-94245A3940C91C80`.
    pub board_id: String,
    /// All detected GPUs, in probe order.
    pub gpus: Vec<Gpu>,
    #[serde(default)]
    pub wifi: WifiChipset,
    /// Discrete GPU, if the machine has one (disabled devices included).
    #[serde(default)]
    pub discrete_gpu: Option<Gpu>,
    /// Integrated GPU presence, used for demux detection.
    #[serde(default)]
    pub has_integrated_gpu: bool,
    /// Current `boot-args` NVRAM value.
    #[serde(default)]
    pub boot_args: String,
    /// Live check: is an audio codec injector kext (AppleALC) loaded?
    #[serde(default)]
    pub applealc_loaded: bool,
}

impl HardwareProfile {
    /// Discrete GPU considered present and enabled.
    ///
    /// A dGPU disabled via class code means the machine was demuxed.
    #[must_use]
    pub fn discrete_gpu_active(&self) -> bool {
        self.discrete_gpu.as_ref().is_some_and(Gpu::is_active)
    }

    /// A machine is demuxed when the iGPU drives the panel and the dGPU is
    /// absent or firmware-disabled. `-wegnoegpu` hides the dGPU too, so its
    /// presence in boot-args disqualifies the heuristic.
    #[must_use]
    pub fn is_demuxed(&self) -> bool {
        !self.boot_args.contains("-wegnoegpu")
            && self.has_integrated_gpu
            && !self.discrete_gpu_active()
    }
}
