//! Live security posture snapshot
//!
//! Computed fresh immediately before each workflow; never cached across
//! runs, because the operator changes these settings between invocations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityState {
    pub sip_enabled: bool,
    pub secure_boot_enabled: bool,
    pub amfi_enabled: bool,
    pub filevault_enabled: bool,
    /// A different patcher's fingerprint files are present on the volume.
    pub foreign_patcher_detected: bool,
    /// Reported board id, checked against the Sandy Bridge allow-lists.
    pub board_id: String,
}

impl SecurityState {
    /// A fully permissive state, useful as a test fixture.
    #[must_use]
    pub fn permissive(board_id: impl Into<String>) -> Self {
        Self {
            sip_enabled: false,
            secure_boot_enabled: false,
            amfi_enabled: false,
            filevault_enabled: false,
            foreign_patcher_detected: false,
            board_id: board_id.into(),
        }
    }
}
