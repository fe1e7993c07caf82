#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Patch-set resolution for rootpatch
//!
//! Two pure functions: [`resolve`] classifies the hardware profile against
//! the running OS into a [`PatchDecision`], and [`build_plan`] expands a
//! decision into the ordered list of filesystem mutations for one run.
//! Neither touches the system; every threshold lives in one place here
//! instead of being scattered across call sites.

mod detect;
mod plan;
pub mod tables;

pub use detect::resolve;
pub use plan::build_plan;
