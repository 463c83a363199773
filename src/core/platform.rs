//! Target platform descriptors.
//!
//! A [`Platform`] names the operating system and architecture a recipe is
//! built for. Option constraints are evaluated against the OS, and the
//! consumer validator compares the target against the host to decide
//! whether a produced binary can be executed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operating system of a build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Windows,
    Macos,
    FreeBsd,
    Android,
    Ios,
}

impl Os {
    /// The OS this binary was compiled for.
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Macos
        } else if cfg!(target_os = "freebsd") {
            Os::FreeBsd
        } else if cfg!(target_os = "android") {
            Os::Android
        } else if cfg!(target_os = "ios") {
            Os::Ios
        } else {
            Os::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "Linux",
            Os::Windows => "Windows",
            Os::Macos => "macOS",
            Os::FreeBsd => "FreeBSD",
            Os::Android => "Android",
            Os::Ios => "iOS",
        }
    }

    /// Extension of the executables this OS runs.
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Os::Windows => ".exe",
            _ => "",
        }
    }

    /// File extensions of linkable libraries on this OS.
    pub fn library_extensions(&self) -> &'static [&'static str] {
        match self {
            Os::Windows => &["lib", "dll"],
            Os::Macos | Os::Ios => &["a", "dylib"],
            _ => &["a", "so"],
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Os::Linux),
            "windows" | "win32" | "win" => Ok(Os::Windows),
            "macos" | "darwin" | "osx" => Ok(Os::Macos),
            "freebsd" => Ok(Os::FreeBsd),
            "android" => Ok(Os::Android),
            "ios" => Ok(Os::Ios),
            _ => Err(PlatformParseError::Os(s.to_string())),
        }
    }
}

/// CPU architecture of a build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    X86,
    Aarch64,
    Arm,
    Riscv64,
}

impl Arch {
    /// The architecture this binary was compiled for.
    pub fn host() -> Self {
        if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else if cfg!(target_arch = "x86") {
            Arch::X86
        } else if cfg!(target_arch = "arm") {
            Arch::Arm
        } else if cfg!(target_arch = "riscv64") {
            Arch::Riscv64
        } else {
            Arch::X86_64
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::X86 => "x86",
            Arch::Aarch64 => "armv8",
            Arch::Arm => "armv7",
            Arch::Riscv64 => "riscv64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Ok(Arch::X86_64),
            "x86" | "i686" | "i386" => Ok(Arch::X86),
            "aarch64" | "arm64" | "armv8" => Ok(Arch::Aarch64),
            "arm" | "armv7" | "armv7hf" => Ok(Arch::Arm),
            "riscv64" => Ok(Arch::Riscv64),
            _ => Err(PlatformParseError::Arch(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown OS or architecture name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformParseError {
    #[error("unknown operating system '{0}', valid values: linux, windows, macos, freebsd, android, ios")]
    Os(String),

    #[error("unknown architecture '{0}', valid values: x86_64, x86, aarch64, arm, riscv64")]
    Arch(String),
}

/// A build target: operating system plus architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Platform { os, arch }
    }

    /// The platform this process is running on.
    pub fn host() -> Self {
        Platform {
            os: Os::host(),
            arch: Arch::host(),
        }
    }

    /// Whether binaries built for this platform can be executed on `host`.
    ///
    /// The OS must match. 32-bit x86 binaries run on x86_64 hosts; every
    /// other architecture must match exactly.
    pub fn can_run_on(&self, host: &Platform) -> bool {
        if self.os != host.os {
            return false;
        }
        self.arch == host.arch || (self.arch == Arch::X86 && host.arch == Arch::X86_64)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
