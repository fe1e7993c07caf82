#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! External tool surface for rootpatch
//!
//! Every shell tool the patcher touches (`cp`, `rsync`, `diskutil`, `bless`,
//! `kmutil` and friends) is invoked through the [`ToolRunner`] trait. That
//! single seam centralizes the non-zero-exit contract and lets the whole
//! workflow run hermetically against [`testing::FakeHost`] in tests.

pub mod process;
pub mod security;
pub mod testing;

pub use process::{run_checked, HostToolRunner, ToolCommand, ToolOutput, ToolRunner};
pub use security::{probe_security_state, SIP_PATCH_MASK_LEGACY, SIP_PATCH_MASK_SNAPSHOT};
pub use testing::FakeHost;
