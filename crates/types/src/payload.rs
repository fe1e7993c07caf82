//! Payload directory layout
//!
//! Patch payloads ship as a local directory tree, keyed by kext family and
//! overlay name. The planner only constructs paths; the executor verifies
//! existence when it runs.
//!
//! ```text
//! <root>/kexts/<family>/<Name.kext>
//! <root>/overlays/<overlay>/...
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadLayout {
    root: PathBuf,
}

impl PayloadLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one family's kernel extensions, e.g.
    /// `kexts/nvidia-tesla`.
    #[must_use]
    pub fn kext_dir(&self, family: &str) -> PathBuf {
        self.root.join("kexts").join(family)
    }

    /// One named kext inside a family directory.
    #[must_use]
    pub fn kext(&self, family: &str, name: &str) -> PathBuf {
        self.kext_dir(family).join(name)
    }

    /// An overlay tree merged over a system directory, e.g.
    /// `overlays/frameworks-accel`.
    #[must_use]
    pub fn overlay(&self, name: &str) -> PathBuf {
        self.root.join("overlays").join(name)
    }
}
