#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Root volume mounting, unmounting and resealing
//!
//! Two volume variants exist. On snapshot-based systems (Big Sur and newer)
//! the live root is a sealed APFS snapshot; patching goes through a separate
//! writable mount of the system volume, and changes only take effect after a
//! new snapshot is blessed. On Catalina and older the root is remounted
//! read-write in place and no snapshot step exists.
//!
//! All disk operations go through Apple's own tools (`diskutil`, `mount`,
//! `bless`, `kmutil`, `kextcache`) via the [`rootpatch_platform::ToolRunner`]
//! seam; this crate never touches block devices directly.

mod mount;
mod seal;

pub use mount::{check_seal, find_root_device, mount, unmount, SEAL_MARKER};
pub use seal::{
    create_snapshot, rebuild_caches, revert_to_sealed_snapshot, seal, NativeRevert,
    APFS_SNAPSHOT_BUG,
};
