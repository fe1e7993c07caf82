#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration loading and validation for rootpatch
//!
//! Policy knobs live in a TOML file; everything has a default so the tool
//! runs without any file present. Unknown keys are rejected to catch typos.

use std::path::{Path, PathBuf};

use rootpatch_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};

/// Default writable mount point for the sealed-snapshot variant.
pub const DEFAULT_MOUNT_POINT: &str = "/System/Volumes/Update/mnt1";

/// Board ids whose Sandy Bridge framebuffer ships with the patch set.
/// Hosts reporting any other board id must spoof one of these before the
/// Sandy Bridge patches are allowed on.
pub const SANDY_BOARD_IDS: [&str; 10] = [
    "Mac-94245B3640C91C81",
    "Mac-94245A3940C91C80",
    "Mac-94245AF5819B141B",
    "Mac-942452F5819B1C1B",
    "Mac-8ED6AF5B48C039E1",
    "Mac-7BA5B2794B2CDB12",
    "Mac-4BC72D62AD45599E",
    "Mac-742912EFDBEE19B3",
    "Mac-C08A6BB70A942AC2",
    "Mac-942B5BF58194151B",
];

/// Board ids the stock Sandy Bridge framebuffer binary supports natively.
/// Any other (spoofed) board id gets the board-id-patched variant instead.
pub const SANDY_BOARD_IDS_STOCK: [&str; 5] = [
    "Mac-94245B3640C91C81",
    "Mac-94245A3940C91C80",
    "Mac-94245AF5819B141B",
    "Mac-942452F5819B1C1B",
    "Mac-8ED6AF5B48C039E1",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub policy: PatchPolicy,
    pub volume: VolumeConfig,
    pub logging: LoggingConfig,
}

/// Knobs that widen or narrow the resolved patch set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PatchPolicy {
    /// Use the Mojave/Catalina acceleration stack for non-Metal GPUs,
    /// pushing the non-Metal OS cutoff back to High Sierra.
    pub moj_cat_accel: bool,
    /// Allow TeraScale 2 acceleration patches. Off by default because of
    /// unresolved sleep/wake hangs on some TS2 machines.
    pub allow_ts2_accel: bool,
    /// Allow patching while FileVault is unlocked on OSes where the patched
    /// volume stays bootable with it on.
    pub allow_fv_root: bool,
}

impl Default for PatchPolicy {
    fn default() -> Self {
        Self {
            moj_cat_accel: false,
            allow_ts2_accel: false,
            allow_fv_root: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VolumeConfig {
    /// Mount point for the writable snapshot mount.
    pub mount_point: PathBuf,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from(DEFAULT_MOUNT_POINT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    /// `plain` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: PatchPolicy::default(),
            volume: VolumeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from an explicit path, or fall back to defaults when `path` is
    /// `None` or the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(p) if p.exists() => Self::load_from(p),
            Some(p) => Err(ConfigError::ReadFailed {
                path: p.display().to_string(),
                message: "file not found".to_string(),
            }
            .into()),
            None => Ok(Self::default()),
        }
    }

    fn load_from(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(ConfigError::Invalid {
                    field: "logging.level".to_string(),
                    message: format!("unknown level '{other}'"),
                }
                .into());
            }
        }
        match self.logging.format.as_str() {
            "plain" | "json" => {}
            other => {
                return Err(ConfigError::Invalid {
                    field: "logging.format".to_string(),
                    message: format!("unknown format '{other}'"),
                }
                .into());
            }
        }
        if !self.volume.mount_point.is_absolute() {
            return Err(ConfigError::Invalid {
                field: "volume.mount_point".to_string(),
                message: "must be an absolute path".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_conservative() {
        let config = Config::default();
        assert!(!config.policy.moj_cat_accel);
        assert!(!config.policy.allow_ts2_accel);
        assert!(!config.policy.allow_fv_root);
        assert_eq!(
            config.volume.mount_point,
            PathBuf::from(DEFAULT_MOUNT_POINT)
        );
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nallow_ts2_accel = true").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert!(config.policy.allow_ts2_accel);
        assert!(!config.policy.moj_cat_accel);
    }

    #[test]
    fn rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nallow_everything = true").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn rejects_bad_level() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"verbose\"").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/rootpatch.toml"))).is_err());
    }
}
