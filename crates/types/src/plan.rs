//! Patch plan: the ordered list of filesystem mutations
//!
//! Order matters twice over: within a category, kernel-extension installs
//! must land before the framework merges that assume them, and between
//! categories the fixed precedence encodes known inter-driver load-order
//! dependencies.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fixed category precedence. The plan builder emits operations grouped by
/// category in this declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchCategory {
    /// Acceleration / framebuffer kernel extensions.
    Graphics,
    /// Framework and PrivateFramework overlay merges for legacy acceleration.
    GraphicsFrameworks,
    /// TeraScale 2 specific extras (extra kexts + framework overlays).
    GraphicsTs2Extras,
    Brightness,
    Audio,
    Wifi,
    Gmux,
    KeyboardBacklight,
}

impl PatchCategory {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::GraphicsFrameworks => "graphics-frameworks",
            Self::GraphicsTs2Extras => "graphics-ts2-extras",
            Self::Brightness => "brightness",
            Self::Audio => "audio",
            Self::Wifi => "wifi",
            Self::Gmux => "gmux",
            Self::KeyboardBacklight => "keyboard-backlight",
        }
    }
}

/// Value for a `defaults write` side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Bool(bool),
    Str(String),
}

/// One filesystem mutation.
///
/// Every added executable tree gets owner `root:wheel` and mode `755` after
/// the copy; merges normalize only the named subtrees, never the whole
/// destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOperation {
    /// Copy `source` into `dest_root/name`, replacing any same-named tree.
    AddTree {
        name: String,
        source: PathBuf,
        dest_root: PathBuf,
    },
    /// Remove `dest_root/name` if present; absence is a logged skip.
    DeleteTree { name: String, dest_root: PathBuf },
    /// Recursively merge `source_root/` into `dest_root`, preserving
    /// unrelated pre-existing destination files, then normalize permissions
    /// on each named subtree.
    MergeTree {
        source_root: PathBuf,
        dest_root: PathBuf,
        normalize: Vec<String>,
    },
    /// `defaults write` side effect riding along with its category.
    WriteDefault {
        domain: String,
        key: String,
        value: DefaultValue,
    },
}

impl PatchOperation {
    /// Short description for progress events and failure reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::AddTree {
                name, dest_root, ..
            } => format!("add {name} to {}", dest_root.display()),
            Self::DeleteTree { name, dest_root } => {
                format!("delete {name} from {}", dest_root.display())
            }
            Self::MergeTree {
                source_root,
                dest_root,
                ..
            } => format!(
                "merge {} into {}",
                source_root.display(),
                dest_root.display()
            ),
            Self::WriteDefault { domain, key, .. } => {
                format!("write default {domain} {key}")
            }
        }
    }
}

/// A plan operation tagged with its owning category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOperation {
    pub category: PatchCategory,
    pub operation: PatchOperation,
}

/// Ordered list of operations for one patch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchPlan {
    pub operations: Vec<PlannedOperation>,
}

impl PatchPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn push(&mut self, category: PatchCategory, operation: PatchOperation) {
        self.operations.push(PlannedOperation {
            category,
            operation,
        });
    }

    /// Categories present in the plan, deduplicated, in plan order.
    #[must_use]
    pub fn categories(&self) -> Vec<PatchCategory> {
        let mut seen = Vec::new();
        for planned in &self.operations {
            if !seen.contains(&planned.category) {
                seen.push(planned.category);
            }
        }
        seen
    }

    /// Verify the category grouping respects the fixed precedence order.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.categories().windows(2).all(|w| w[0] <= w[1])
    }
}
