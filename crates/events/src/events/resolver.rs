use serde::{Deserialize, Serialize};

use rootpatch_types::GpuArch;

/// Hardware detection and patch-set resolution events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverEvent {
    DetectionStarted,

    /// One GPU classified during detection
    GpuDetected {
        vendor_id: u32,
        device_id: u32,
        arch: GpuArch,
        active: bool,
    },

    /// A patch category was switched on
    CategoryEnabled { category: String },

    /// Resolution finished with at least one applicable category
    DecisionReady { summary: Vec<String> },

    /// Nothing applies to this hardware/OS combination
    NoPatchesApplicable,
}
