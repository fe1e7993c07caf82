#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Shared data model for rootpatch
//!
//! Everything in this crate is plain, immutable-per-run data: the hardware
//! profile and OS version supplied by external probes, the patch decision
//! derived from them, the operation plan, and the volume/security state
//! snapshots the workflows thread through every call.

pub mod backup;
pub mod decision;
pub mod hardware;
pub mod os;
pub mod payload;
pub mod plan;
pub mod security;
pub mod volume;

pub use backup::{BackupRecord, DirectoryRevert, RevertStatus, BACKUP_LOCATIONS};
pub use decision::PatchDecision;
pub use hardware::{Gpu, GpuArch, HardwareProfile, WifiChipset};
pub use os::{MacosRelease, OsVersion};
pub use payload::PayloadLayout;
pub use plan::{DefaultValue, PatchCategory, PatchOperation, PatchPlan, PlannedOperation};
pub use security::SecurityState;
pub use volume::{VolumeHandle, VolumeVariant};
