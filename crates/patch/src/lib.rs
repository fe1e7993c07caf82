#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Patch plan execution and backup management
//!
//! The executor walks a [`rootpatch_types::PatchPlan`] in order and issues
//! each mutation through the external tool seam. The first failing command
//! aborts the rest of the plan; already-applied operations are left in place
//! for the unpatch workflow to clean up. The backup module archives the
//! patched system directories before the first mutation and restores them
//! during a manual revert.

mod backup;
mod executor;

pub use backup::{backup_if_needed, create_backup, has_backup, restore_backup};
pub use executor::apply_plan;
