//! OS detection and compatibility.
//!
//! The host platform is detected once and then passed around as a value, so
//! rule evaluation and command building can be exercised against synthetic
//! platforms.

use std::fmt;

use tracing::debug;

/// Operating system names as they appear in manifest rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Windows,
    Osx,
    Linux,
}

impl Os {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Osx => "osx",
            Self::Linux => "linux",
        }
    }

    /// Separator used between classpath entries.
    pub const fn classpath_separator(self) -> &'static str {
        match self {
            Self::Windows => ";",
            Self::Osx | Self::Linux => ":",
        }
    }
}

/// CPU architecture names as they appear in manifest rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    X86,
    Arm64,
}

impl Arch {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::X86 => "x86",
            Self::Arm64 => "arm64",
        }
    }

    /// Value substituted for `${arch}` in native classifier keys.
    pub const fn bitness(self) -> &'static str {
        match self {
            Self::X86 => "32",
            Self::X86_64 | Self::Arm64 => "64",
        }
    }
}

/// The platform the game is installed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
    /// Running under a binary translation layer (Rosetta 2).
    pub translated: bool,
}

impl Platform {
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self {
            os,
            arch,
            translated: false,
        }
    }

    /// Detects the host platform.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "windows" => Os::Windows,
            "macos" => Os::Osx,
            _ => Os::Linux,
        };
        let arch = match std::env::consts::ARCH {
            "aarch64" => Arch::Arm64,
            "x86" => Arch::X86,
            _ => Arch::X86_64,
        };
        let translated = os == Os::Osx && detect_rosetta();
        let platform = Self {
            os,
            arch,
            translated,
        };
        debug!("Detected platform: {platform}");
        platform
    }

    pub fn os_name(&self) -> &'static str {
        self.os.as_str()
    }

    pub fn arch_name(&self) -> &'static str {
        self.arch.as_str()
    }

    /// Whether an x86_64-only stack must be wrapped with `arch -x86_64`.
    pub fn needs_translation_prefix(&self) -> bool {
        self.os == Os::Osx && self.arch == Arch::Arm64 && !self.translated
    }

    /// Native classifiers tried when a library has no `natives` map.
    pub fn default_native_classifiers(&self) -> Vec<String> {
        let os = self.os.as_str();
        match self.arch {
            Arch::Arm64 => vec![format!("natives-{os}-arm64"), format!("natives-{os}")],
            Arch::X86 => vec![format!("natives-{os}-x86"), format!("natives-{os}")],
            Arch::X86_64 => vec![format!("natives-{os}")],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os.as_str(), self.arch.as_str())?;
        if self.translated {
            f.write_str(" (translated)")?;
        }
        Ok(())
    }
}

/// Checks `sysctl.proc_translated`, which is `1` under Rosetta 2.
#[cfg(target_os = "macos")]
fn detect_rosetta() -> bool {
    std::process::Command::new("sysctl")
        .args(["-n", "sysctl.proc_translated"])
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).trim() == "1")
        .unwrap_or(false)
}

#[cfg(not(target_os = "macos"))]
fn detect_rosetta() -> bool {
    false
}
