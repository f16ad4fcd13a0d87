//! Build information printed by `selfext --version`

use crate::assets::EmbeddedAssets;
use std::fmt;

/// What this binary is and what it was built with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: &'static str,
    pub git_commit: &'static str,
    pub build_date: &'static str,
    /// Embedded Go distribution file name, if any
    pub toolchain: Option<&'static str>,
    /// Rust target triple selfext was compiled for
    pub rustc_target: &'static str,
    /// `os/arch` of the running host
    pub platform: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: crate::VERSION,
            git_commit: env!("SELFEXT_GIT_COMMIT"),
            build_date: env!("SELFEXT_BUILD_DATE"),
            toolchain: EmbeddedAssets::toolchain_name(),
            rustc_target: env!("SELFEXT_BUILD_TARGET"),
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "selfext {} ({} {})", self.version, self.git_commit, self.build_date)?;
        writeln!(
            f,
            "toolchain: {}",
            self.toolchain.unwrap_or("none (set SELFEXT_TOOLCHAIN_ARCHIVE)")
        )?;
        write!(f, "built for: {}, running on: {}", self.rustc_target, self.platform)
    }
}
