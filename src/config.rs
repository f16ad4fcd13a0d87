//! Pack configuration
//!
//! [`PackConfig`] is what a single run needs. [`Settings`] is the optional
//! user file (`selfext.toml`) that supplies defaults for it.

use crate::error::{SelfextError, SelfextResult};
use crate::paths::expand_path;
use crate::target::{BuildTarget, TargetArch, TargetOs};
use crate::toolchain::default_cache_root;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the toolchain cache root
pub const CACHE_DIR_ENV: &str = "SELFEXT_CACHE_DIR";

/// Settings file name inside the selfext config directory
pub const SETTINGS_FILE_NAME: &str = "selfext.toml";

/// Configuration for one pack
#[derive(Debug, Clone, Default)]
pub struct PackConfig {
    /// Archive to wrap as given by the user; `None` means nothing to do
    pub archive: Option<String>,
    /// Target OS, host when unset
    pub os: Option<TargetOs>,
    /// Target architecture, host when unset
    pub arch: Option<TargetArch>,
    /// Toolchain cache root, `<config dir>/selfext/go` when unset
    pub cache_root: Option<PathBuf>,
    /// Parent of the scratch workspace, system temp dir when unset
    pub scratch_root: Option<PathBuf>,
    /// Installed Go to build with instead of the embedded toolchain
    pub goroot: Option<PathBuf>,
}

impl PackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults taken from a settings file
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            archive: None,
            os: settings.target.os,
            arch: settings.target.arch,
            cache_root: settings.cache.dir.clone(),
            scratch_root: None,
            goroot: settings.toolchain.goroot.clone(),
        }
    }

    pub fn with_archive(mut self, archive: impl Into<String>) -> Self {
        self.archive = Some(archive.into());
        self
    }

    pub fn with_target(mut self, target: BuildTarget) -> Self {
        self.os = Some(target.os);
        self.arch = Some(target.arch);
        self
    }

    pub fn with_os(mut self, os: TargetOs) -> Self {
        self.os = Some(os);
        self
    }

    pub fn with_arch(mut self, arch: TargetArch) -> Self {
        self.arch = Some(arch);
        self
    }

    pub fn with_cache_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(dir.into());
        self
    }

    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    pub fn with_goroot(mut self, dir: impl Into<PathBuf>) -> Self {
        self.goroot = Some(dir.into());
        self
    }

    /// Resolved target, filling unset halves from the host
    pub fn target(&self) -> SelfextResult<BuildTarget> {
        let os = match self.os {
            Some(os) => os,
            None => TargetOs::host()?,
        };
        let arch = match self.arch {
            Some(arch) => arch,
            None => TargetArch::host()?,
        };
        let target = BuildTarget::new(os, arch);
        target.validate()?;
        Ok(target)
    }

    /// Resolved toolchain cache root
    pub fn cache_root(&self) -> SelfextResult<PathBuf> {
        match &self.cache_root {
            Some(dir) => expand_path(&dir.to_string_lossy()),
            None => default_cache_root(),
        }
    }

    /// Resolved `goroot`, if one was configured
    pub fn goroot(&self) -> SelfextResult<Option<PathBuf>> {
        self.goroot
            .as_ref()
            .map(|dir| expand_path(&dir.to_string_lossy()))
            .transpose()
    }
}

/// Contents of `selfext.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub target: TargetSettings,
    pub cache: CacheSettings,
    pub toolchain: ToolchainSettings,
}

/// `[target]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<TargetOs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<TargetArch>,
}

/// `[cache]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// `[toolchain]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goroot: Option<PathBuf>,
}

impl Settings {
    /// `<user config dir>/selfext/selfext.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("selfext").join(SETTINGS_FILE_NAME))
    }

    /// Load settings from file
    pub fn from_file(path: impl AsRef<Path>) -> SelfextResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SelfextError::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            SelfextError::Config(format!(
                "Failed to parse settings file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse settings from TOML string
    pub fn parse(content: &str) -> SelfextResult<Self> {
        toml::from_str(content)
            .map_err(|e| SelfextError::Config(format!("Failed to parse settings: {}", e)))
    }

    /// Load `explicit` if given (it must exist), else the default file if present
    pub fn load(explicit: Option<&Path>) -> SelfextResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let settings = Settings::parse(
            r#"
[target]
os = "linux"
arch = "aarch64"

[cache]
dir = "/opt/selfext-cache"

[toolchain]
goroot = "/usr/local/go"
"#,
        )
        .unwrap();

        assert_eq!(settings.target.os, Some(TargetOs::Linux));
        assert_eq!(settings.target.arch, Some(TargetArch::Arm64));
        assert_eq!(settings.cache.dir, Some(PathBuf::from("/opt/selfext-cache")));
        assert_eq!(settings.toolchain.goroot, Some(PathBuf::from("/usr/local/go")));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Settings::parse("").unwrap(), Settings::default());
    }

    #[test]
    fn test_parse_unknown_key() {
        let err = Settings::parse("[target]\ncpu = \"z80\"\n").unwrap_err();
        assert!(matches!(err, SelfextError::Config(_)));
    }

    #[test]
    fn test_parse_bad_os() {
        assert!(Settings::parse("[target]\nos = \"plan9\"\n").is_err());
    }

    #[test]
    fn test_builder_overrides_settings() {
        let settings = Settings {
            target: TargetSettings {
                os: Some(TargetOs::Darwin),
                arch: Some(TargetArch::Amd64),
            },
            cache: CacheSettings {
                dir: Some(PathBuf::from("/from/file")),
            },
            toolchain: ToolchainSettings {
                goroot: Some(PathBuf::from("/usr/local/go")),
            },
        };

        let config = PackConfig::from_settings(&settings)
            .with_arch(TargetArch::Arm64)
            .with_cache_root("/from/cli");

        assert_eq!(
            config.target().unwrap(),
            BuildTarget::new(TargetOs::Darwin, TargetArch::Arm64)
        );
        assert_eq!(config.cache_root().unwrap(), PathBuf::from("/from/cli"));
        assert_eq!(config.goroot().unwrap(), Some(PathBuf::from("/usr/local/go")));
    }

    #[test]
    fn test_unsupported_target_rejected() {
        let config = PackConfig::new().with_target(BuildTarget::new(TargetOs::Darwin, TargetArch::Arm));
        assert!(matches!(
            config.target(),
            Err(SelfextError::UnsupportedTarget(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Settings::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("settings file"));
    }
}
