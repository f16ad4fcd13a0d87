//! Build targets for the generated executable
//!
//! Names follow the Go toolchain (`GOOS`/`GOARCH`) since that is what the
//! values are handed to. Rust-style spellings are accepted as aliases.

use crate::error::{SelfextError, SelfextResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetOs {
    Windows,
    Linux,
    Darwin,
    FreeBsd,
}

/// Target CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetArch {
    Amd64,
    I386,
    Arm64,
    Arm,
}

/// OS/architecture pairs the embedded toolchain can produce without cgo
const SUPPORTED: &[(TargetOs, TargetArch)] = &[
    (TargetOs::Windows, TargetArch::Amd64),
    (TargetOs::Windows, TargetArch::I386),
    (TargetOs::Windows, TargetArch::Arm64),
    (TargetOs::Linux, TargetArch::Amd64),
    (TargetOs::Linux, TargetArch::I386),
    (TargetOs::Linux, TargetArch::Arm64),
    (TargetOs::Linux, TargetArch::Arm),
    (TargetOs::Darwin, TargetArch::Amd64),
    (TargetOs::Darwin, TargetArch::Arm64),
    (TargetOs::FreeBsd, TargetArch::Amd64),
    (TargetOs::FreeBsd, TargetArch::I386),
    (TargetOs::FreeBsd, TargetArch::Arm64),
];

impl TargetOs {
    /// The OS this binary was compiled for
    pub fn host() -> SelfextResult<Self> {
        std::env::consts::OS.parse()
    }

    /// Value for `GOOS`
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOs::Windows => "windows",
            TargetOs::Linux => "linux",
            TargetOs::Darwin => "darwin",
            TargetOs::FreeBsd => "freebsd",
        }
    }
}

impl TargetArch {
    /// The architecture this binary was compiled for
    pub fn host() -> SelfextResult<Self> {
        std::env::consts::ARCH.parse()
    }

    /// Value for `GOARCH`
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetArch::Amd64 => "amd64",
            TargetArch::I386 => "386",
            TargetArch::Arm64 => "arm64",
            TargetArch::Arm => "arm",
        }
    }
}

impl FromStr for TargetOs {
    type Err = SelfextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "win" => Ok(TargetOs::Windows),
            "linux" => Ok(TargetOs::Linux),
            "darwin" | "macos" | "mac" => Ok(TargetOs::Darwin),
            "freebsd" => Ok(TargetOs::FreeBsd),
            other => Err(SelfextError::UnsupportedTarget(format!(
                "unknown operating system '{}'",
                other
            ))),
        }
    }
}

impl FromStr for TargetArch {
    type Err = SelfextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" | "x64" => Ok(TargetArch::Amd64),
            "386" | "x86" | "i386" | "i686" => Ok(TargetArch::I386),
            "arm64" | "aarch64" => Ok(TargetArch::Arm64),
            "arm" | "armv7" => Ok(TargetArch::Arm),
            other => Err(SelfextError::UnsupportedTarget(format!(
                "unknown architecture '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TargetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TargetOs {
    type Error = SelfextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for TargetArch {
    type Error = SelfextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetOs> for String {
    fn from(value: TargetOs) -> Self {
        value.as_str().to_string()
    }
}

impl From<TargetArch> for String {
    fn from(value: TargetArch) -> Self {
        value.as_str().to_string()
    }
}

/// Operating system and architecture of the produced executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildTarget {
    pub os: TargetOs,
    pub arch: TargetArch,
}

impl BuildTarget {
    pub fn new(os: TargetOs, arch: TargetArch) -> Self {
        Self { os, arch }
    }

    /// The platform selfext itself runs on
    pub fn host() -> SelfextResult<Self> {
        Ok(Self::new(TargetOs::host()?, TargetArch::host()?))
    }

    /// Whether the toolchain can build this pair
    pub fn is_supported(&self) -> bool {
        SUPPORTED.contains(&(self.os, self.arch))
    }

    /// Fail with `UnsupportedTarget` for pairs the toolchain cannot build
    pub fn validate(&self) -> SelfextResult<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(SelfextError::UnsupportedTarget(format!(
                "{} is not a supported target",
                self
            )))
        }
    }

    /// Environment overlay selecting this target
    pub fn env(&self) -> [(&'static str, &'static str); 2] {
        [("GOOS", self.os.as_str()), ("GOARCH", self.arch.as_str())]
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_names() {
        assert_eq!("windows".parse::<TargetOs>().unwrap(), TargetOs::Windows);
        assert_eq!("darwin".parse::<TargetOs>().unwrap(), TargetOs::Darwin);
        assert_eq!("386".parse::<TargetArch>().unwrap(), TargetArch::I386);
        assert_eq!("arm64".parse::<TargetArch>().unwrap(), TargetArch::Arm64);
    }

    #[test]
    fn test_parse_rust_aliases() {
        assert_eq!("macos".parse::<TargetOs>().unwrap(), TargetOs::Darwin);
        assert_eq!("x86_64".parse::<TargetArch>().unwrap(), TargetArch::Amd64);
        assert_eq!("aarch64".parse::<TargetArch>().unwrap(), TargetArch::Arm64);
        assert_eq!("X86".parse::<TargetArch>().unwrap(), TargetArch::I386);
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            "plan9".parse::<TargetOs>(),
            Err(SelfextError::UnsupportedTarget(_))
        ));
        assert!("riscv64".parse::<TargetArch>().is_err());
    }

    #[test]
    fn test_supported_pairs() {
        assert!(BuildTarget::new(TargetOs::Darwin, TargetArch::Arm64).is_supported());
        assert!(!BuildTarget::new(TargetOs::Darwin, TargetArch::I386).is_supported());
        assert!(BuildTarget::new(TargetOs::Darwin, TargetArch::Arm)
            .validate()
            .is_err());
    }

    #[test]
    fn test_env_overlay() {
        let target = BuildTarget::new(TargetOs::Windows, TargetArch::Amd64);
        assert_eq!(target.env(), [("GOOS", "windows"), ("GOARCH", "amd64")]);
        assert_eq!(target.to_string(), "windows/amd64");
    }

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    #[test]
    fn test_host_linux_amd64() {
        assert_eq!(
            BuildTarget::host().unwrap(),
            BuildTarget::new(TargetOs::Linux, TargetArch::Amd64)
        );
    }
}
