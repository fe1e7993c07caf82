#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Workflow orchestration for rootpatch
//!
//! The orchestrator drives the two workflows end to end: `patch` (resolve,
//! gate, mount, back up, apply, seal) and `unpatch` (gate, mount, native
//! snapshot revert with a manual archive-restore fallback). Stages run
//! strictly in sequence; every terminal state that is not an internal error
//! comes back as an outcome value, so the CLI can render and exit-code each
//! one deliberately.

mod orchestrator;
mod outcome;

pub use orchestrator::{Orchestrator, OrchestratorBuilder, StatusReport};
pub use outcome::{PatchOutcome, UnpatchOutcome};

// The outcome types carry these; re-exported so the CLI renders them without
// depending on the guard crate directly.
pub use rootpatch_guard::{Blocker, GateReport};
