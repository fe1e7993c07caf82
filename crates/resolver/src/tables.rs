//! Kext set and model membership tables
//!
//! Names here mirror the payload tree layout: each constant lists the kexts
//! installed from (or removed ahead of) one payload family.

/// Payload family directory names under `kexts/`.
pub mod family {
    pub const GENERAL: &str = "general";
    pub const NVIDIA_TESLA: &str = "nvidia-tesla";
    pub const NVIDIA_KEPLER: &str = "nvidia-kepler";
    pub const AMD_TERASCALE: &str = "amd-terascale";
    pub const AMD_TERASCALE_2: &str = "amd-terascale-2";
    pub const INTEL_GEN1: &str = "intel-gen1";
    pub const INTEL_GEN2: &str = "intel-gen2";
    pub const INTEL_GEN3: &str = "intel-gen3";
    pub const BRIGHTNESS: &str = "brightness";
    pub const AUDIO: &str = "audio";
    pub const AUDIO_V2: &str = "audio-v2";
    pub const MUX: &str = "mux";
}

/// Overlay directory names under `overlays/`.
pub mod overlay {
    pub const FRAMEWORKS_ACCEL: &str = "frameworks-accel";
    pub const FRAMEWORKS_ACCEL_IVY: &str = "frameworks-accel-ivy";
    pub const FRAMEWORKS_ACCEL_KEPLER: &str = "frameworks-accel-kepler";
    pub const FRAMEWORKS_ACCEL_TS2: &str = "frameworks-accel-ts2";
    pub const PRIVATE_FRAMEWORKS_ACCEL: &str = "private-frameworks-accel";
    pub const PRIVATE_FRAMEWORKS_ACCEL_IVY: &str = "private-frameworks-accel-ivy";
    pub const PRIVATE_FRAMEWORKS_ACCEL_TS2: &str = "private-frameworks-accel-ts2";
    pub const PRIVATE_FRAMEWORKS_BRIGHTNESS: &str = "private-frameworks-brightness";
    pub const PRIVATE_FRAMEWORKS_DRM: &str = "private-frameworks-drm";
    pub const CORESERVICES_WIFI: &str = "coreservices-wifi";
    pub const LIBEXEC_WIFI: &str = "libexec-wifi";
    pub const SKYLIGHT_WIFI: &str = "skylight-wifi";
    pub const SKYLIGHT_DROPBOX: &str = "skylight-dropbox";
    pub const SKYLIGHT_KEYBOARD_BACKLIGHT: &str = "skylight-keyboard-backlight";
}

// Shared acceleration plumbing, per OS generation.
pub const ADD_GENERAL_ACCEL_MOJAVE: &[&str] = &["IOAcceleratorFamily2.kext"];
pub const ADD_GENERAL_ACCEL_CATALINA: &[&str] = &["IOAcceleratorFamily2.kext", "IOSurface.kext"];
pub const ADD_GENERAL_ACCEL: &[&str] = &["IOAcceleratorFamily2.kext", "IOSurface.kext"];

// Nvidia Tesla/Fermi
pub const ADD_NVIDIA_ACCEL: &[&str] = &[
    "GeForceGA.plugin",
    "GeForceTesla.kext",
    "GeForceTeslaGLDriver.bundle",
    "GeForceTeslaVADriver.bundle",
    "NVDANV50HalTesla.kext",
    "NVDAResmanTesla.kext",
];
pub const DELETE_NVIDIA_ACCEL: &[&str] = &[
    "GeForceTesla.kext",
    "NVDANV50HalTesla.kext",
    "NVDAResmanTesla.kext",
];
pub const ADD_NVIDIA_BRIGHTNESS: &[&str] = &[
    "GeForceTesla.kext",
    "NVDANV50HalTesla.kext",
    "NVDAResmanTesla.kext",
];
// NVDAStartup was dropped from the OS in 12.1 betas; reinstated from the
// Kepler payload family.
pub const ADD_NVIDIA_TESLA_STARTUP: &[&str] = &["NVDAStartup.kext"];

// Nvidia Kepler
pub const ADD_NVIDIA_KEPLER_ACCEL: &[&str] = &[
    "GeForce.kext",
    "GeForceAIRPlugin.bundle",
    "GeForceGLDriver.bundle",
    "GeForceMTLDriver.bundle",
    "GeForceVADriver.bundle",
    "NVDAGF100Hal.kext",
    "NVDAGK100Hal.kext",
    "NVDAResman.kext",
    "NVDAStartup.kext",
];

// AMD TeraScale
pub const ADD_AMD_ACCEL: &[&str] = &[
    "AMD2400Controller.kext",
    "AMD2600Controller.kext",
    "AMDFramebuffer.kext",
    "AMDLegacyFramebuffer.kext",
    "AMDLegacySupport.kext",
    "AMDRadeonVADriver.bundle",
    "AMDRadeonX2000.kext",
    "AMDRadeonX2000GLDriver.bundle",
];
pub const DELETE_AMD_ACCEL: &[&str] = &[
    "AMDRadeonX4000.kext",
    "AMDRadeonX4000HWServices.kext",
    "AMDRadeonX5000.kext",
    "AMDRadeonX5000HWServices.kext",
];
pub const DELETE_AMD_ACCEL_TS2: &[&str] =
    &["AMDRadeonVADriver2.bundle", "AMDRadeonX4000GLDriver.bundle"];
pub const ADD_AMD_ACCEL_TS2: &[&str] = &["AMDRadeonX3000.kext", "AMDRadeonX3000GLDriver.bundle"];
pub const ADD_AMD_BRIGHTNESS: &[&str] = &["AMDLegacyFramebuffer.kext", "AMDLegacySupport.kext"];

// Intel
pub const ADD_INTEL_GEN1_ACCEL: &[&str] = &[
    "AppleIntelHDGraphics.kext",
    "AppleIntelHDGraphicsFB.kext",
    "AppleIntelHDGraphicsGA.plugin",
    "AppleIntelHDGraphicsGLDriver.bundle",
    "AppleIntelHDGraphicsVADriver.bundle",
];
pub const ADD_INTEL_GEN2_ACCEL: &[&str] = &[
    "AppleIntelHD3000Graphics.kext",
    "AppleIntelHD3000GraphicsGA.plugin",
    "AppleIntelHD3000GraphicsGLDriver.bundle",
    "AppleIntelHD3000GraphicsVADriver.bundle",
    "AppleIntelSNBVA.bundle",
];
pub const ADD_INTEL_GEN3_ACCEL: &[&str] = &[
    "AppleIntelFramebufferCapri.kext",
    "AppleIntelHD4000Graphics.kext",
    "AppleIntelHD4000GraphicsGLDriver.bundle",
    "AppleIntelHD4000GraphicsVADriver.bundle",
];
/// Sandy Bridge framebuffer, handled outside the bulk list because the
/// stock vs board-id-patched variant is chosen at plan time.
pub const INTEL_SNB_FRAMEBUFFER: &str = "AppleIntelSNBGraphicsFB.kext";
pub const INTEL_SNB_FRAMEBUFFER_CLEAN: &str = "AppleIntelSNBGraphicsFB-Clean.kext";

// Brightness / audio / mux
pub const DELETE_BRIGHTNESS: &[&str] = &["AppleBacklight.kext", "AppleBacklightExpert.kext"];
pub const ADD_BRIGHTNESS: &[&str] = &["AppleBacklight.kext", "AppleBacklightExpert.kext"];
pub const DELETE_VOLUME_CONTROL: &[&str] = &["AppleHDA.kext", "IOAudioFamily.kext"];
pub const ADD_VOLUME_CONTROL: &[&str] = &["AppleHDA.kext", "IOAudioFamily.kext"];
pub const ADD_VOLUME_CONTROL_V2: &[&str] = &["AppleHDA.kext"];
pub const MUX_KEXT: &str = "AppleMuxControl.kext";

/// Models whose backlight control needs the legacy patch set.
pub const LEGACY_BRIGHTNESS_MODELS: &[&str] = &["MacBook5,2", "iMac7,1", "iMac8,1", "iMac9,1"];

/// Models with botched GOPs where the boot screen breaks the audio codec
/// injector outright; patched unconditionally.
pub const BROKEN_GOP_AUDIO_MODELS: &[&str] = &["iMac7,1", "iMac8,1"];

/// Models whose audio needs patching unless a codec injector kext is
/// already loaded.
pub const LEGACY_AUDIO_MODELS: &[&str] = &[
    "MacBook5,2",
    "MacBook6,1",
    "MacBook7,1",
    "MacBookAir2,1",
    "Macmini3,1",
    "iMac9,1",
    "MacPro3,1",
];

/// Models eligible for the legacy GPU mux brightness patch. Restricted to
/// the 2011 15"/17" MacBook Pro; the 2009 5,x machines kernel panic with
/// this set and stay excluded until that is understood.
pub const LEGACY_GMUX_MODELS: &[&str] = &["MacBookPro8,2", "MacBookPro8,3"];
