//! Supported macOS releases as an ordered enumeration
//!
//! Every OS-version threshold in the system compares against these named
//! releases; no call site carries a bare Darwin-major literal.

use serde::{Deserialize, Serialize};

/// A macOS release, ordered by Darwin major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacosRelease {
    ElCapitan,
    Sierra,
    HighSierra,
    Mojave,
    Catalina,
    BigSur,
    Monterey,
}

impl MacosRelease {
    /// Darwin kernel major version for this release.
    #[must_use]
    pub fn darwin_major(self) -> u32 {
        match self {
            Self::ElCapitan => 15,
            Self::Sierra => 16,
            Self::HighSierra => 17,
            Self::Mojave => 18,
            Self::Catalina => 19,
            Self::BigSur => 20,
            Self::Monterey => 21,
        }
    }

    /// Map a Darwin major version onto a known release.
    #[must_use]
    pub fn from_darwin_major(major: u32) -> Option<Self> {
        match major {
            15 => Some(Self::ElCapitan),
            16 => Some(Self::Sierra),
            17 => Some(Self::HighSierra),
            18 => Some(Self::Mojave),
            19 => Some(Self::Catalina),
            20 => Some(Self::BigSur),
            21 => Some(Self::Monterey),
            _ => None,
        }
    }

    /// Big Sur and newer boot from a sealed APFS snapshot; older releases
    /// expose a directly writable root.
    #[must_use]
    pub fn uses_snapshots(self) -> bool {
        self > Self::Catalina
    }

    /// Releases with a working legacy acceleration patch set.
    #[must_use]
    pub fn supports_legacy_accel(self) -> bool {
        matches!(
            self,
            Self::Mojave | Self::Catalina | Self::BigSur | Self::Monterey
        )
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ElCapitan => "El Capitan",
            Self::Sierra => "Sierra",
            Self::HighSierra => "High Sierra",
            Self::Mojave => "Mojave",
            Self::Catalina => "Catalina",
            Self::BigSur => "Big Sur",
            Self::Monterey => "Monterey",
        }
    }
}

impl std::fmt::Display for MacosRelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The running OS version, supplied by the external OS-state provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsVersion {
    pub release: MacosRelease,
    /// Darwin minor version (e.g. `1` for 21.1.0).
    pub minor: u32,
    /// OS build string (e.g. `21A559`).
    pub build: String,
}

impl OsVersion {
    #[must_use]
    pub fn new(release: MacosRelease, minor: u32, build: impl Into<String>) -> Self {
        Self {
            release,
            minor,
            build: build.into(),
        }
    }
}

impl std::fmt::Display for OsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (Darwin {}.{}, build {})",
            self.release,
            self.release.darwin_major(),
            self.minor,
            self.build
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_ordering_follows_darwin_major() {
        assert!(MacosRelease::BigSur > MacosRelease::Catalina);
        assert!(MacosRelease::Monterey > MacosRelease::BigSur);
        assert!(MacosRelease::HighSierra < MacosRelease::Mojave);
    }

    #[test]
    fn snapshot_variants() {
        assert!(!MacosRelease::Catalina.uses_snapshots());
        assert!(MacosRelease::BigSur.uses_snapshots());
        assert!(MacosRelease::Monterey.uses_snapshots());
    }

    #[test]
    fn darwin_major_round_trips() {
        for major in 15..=21 {
            let release = MacosRelease::from_darwin_major(major).unwrap();
            assert_eq!(release.darwin_major(), major);
        }
        assert!(MacosRelease::from_darwin_major(22).is_none());
    }
}
