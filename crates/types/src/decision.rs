//! The patch decision derived once per run
//!
//! One immutable value produced by the resolver and threaded explicitly
//! through the gate, the planner and the orchestrator. No component mutates
//! it after resolution.

use serde::{Deserialize, Serialize};

/// Per-category patch flags plus the derived policy flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDecision {
    // Graphics categories
    pub nvidia_legacy: bool,
    pub kepler_gpu: bool,
    pub amd_ts1: bool,
    pub amd_ts2: bool,
    pub iron_gpu: bool,
    pub sandy_gpu: bool,
    pub ivy_gpu: bool,

    // Non-graphics categories
    pub brightness_legacy: bool,
    pub legacy_audio: bool,
    pub legacy_wifi: bool,
    pub legacy_gmux: bool,
    pub legacy_keyboard_backlight: bool,

    // Derived flags
    /// Unsigned non-Metal binaries need AMFI out of the way.
    pub amfi_must_disable: bool,
    /// Sandy Bridge framebuffer only works on an allow-listed board id.
    pub check_board_id: bool,
    /// A Metal-capable GPU is present on an OS where it can accelerate.
    pub supports_metal: bool,
}

impl PatchDecision {
    /// True when no patch category applies.
    ///
    /// Keyboard backlight deliberately does not participate: it is a
    /// piggyback patch that never warrants a run on its own.
    #[must_use]
    pub fn no_patch(&self) -> bool {
        !(self.nvidia_legacy
            || self.kepler_gpu
            || self.amd_ts1
            || self.amd_ts2
            || self.iron_gpu
            || self.sandy_gpu
            || self.ivy_gpu
            || self.brightness_legacy
            || self.legacy_audio
            || self.legacy_wifi
            || self.legacy_gmux)
    }

    /// Whether any non-Metal legacy graphics category is enabled.
    #[must_use]
    pub fn any_legacy_gpu(&self) -> bool {
        self.nvidia_legacy || self.amd_ts1 || self.amd_ts2 || self.iron_gpu || self.sandy_gpu
    }

    /// Human-readable summary lines, one per enabled category.
    #[must_use]
    pub fn summary(&self) -> Vec<&'static str> {
        let mut lines = Vec::new();
        if self.nvidia_legacy {
            lines.push("Legacy Nvidia Tesla/Fermi graphics");
        }
        if self.kepler_gpu {
            lines.push("Nvidia Kepler graphics");
        }
        if self.amd_ts1 {
            lines.push("AMD TeraScale 1 graphics");
        }
        if self.amd_ts2 {
            lines.push("AMD TeraScale 2 graphics");
        }
        if self.iron_gpu {
            lines.push("Intel Ironlake graphics");
        }
        if self.sandy_gpu {
            lines.push("Intel Sandy Bridge graphics");
        }
        if self.ivy_gpu {
            lines.push("Intel Ivy Bridge graphics");
        }
        if self.brightness_legacy {
            lines.push("Legacy brightness control");
        }
        if self.legacy_audio {
            lines.push("Legacy audio control");
        }
        if self.legacy_wifi {
            lines.push("Legacy Wi-Fi");
        }
        if self.legacy_gmux {
            lines.push("Legacy GPU mux brightness");
        }
        if self.legacy_keyboard_backlight {
            lines.push("Legacy keyboard backlight");
        }
        lines
    }
}
