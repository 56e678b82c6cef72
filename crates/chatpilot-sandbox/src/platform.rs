//! Platform detection for OS-level isolation.

use std::fmt;
use std::path::Path;

/// Platforms with an isolation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// macOS using sandbox-exec (Seatbelt).
    MacOS,
    /// Linux using bubblewrap + socat.
    Linux,
    /// Anything else.
    Unsupported,
}

impl Platform {
    /// Detect the current platform.
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "linux" => Platform::Linux,
            _ => Platform::Unsupported,
        }
    }

    /// Binaries the isolation backend needs on `PATH`.
    pub fn required_binaries(&self) -> &'static [&'static str] {
        match self {
            Platform::MacOS => &["sandbox-exec"],
            Platform::Linux => &["bwrap", "socat"],
            Platform::Unsupported => &[],
        }
    }

    /// Get the display name for this platform.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::MacOS => "macOS",
            Platform::Linux => "Linux",
            Platform::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether isolation can be used here.
#[derive(Debug, Clone)]
pub enum SandboxStatus {
    /// Isolation backend present.
    Available { platform: Platform },

    /// Backend binaries missing.
    MissingDependency {
        platform: Platform,
        missing: Vec<String>,
        install_hint: String,
    },

    /// No backend for this OS.
    Unsupported { platform_name: String },
}

impl SandboxStatus {
    /// Check if isolation is available.
    pub fn is_available(&self) -> bool {
        matches!(self, SandboxStatus::Available { .. })
    }

    /// Detect isolation availability for the current platform.
    pub fn detect() -> Self {
        Self::detect_with(Platform::detect(), |bin| on_path(bin))
    }

    fn detect_with(platform: Platform, exists: impl Fn(&str) -> bool) -> Self {
        if platform == Platform::Unsupported {
            return SandboxStatus::Unsupported {
                platform_name: std::env::consts::OS.to_string(),
            };
        }

        let missing: Vec<String> = platform
            .required_binaries()
            .iter()
            .filter(|bin| !exists(bin))
            .map(|bin| bin.to_string())
            .collect();

        if missing.is_empty() {
            return SandboxStatus::Available { platform };
        }

        let install_hint = match platform {
            Platform::Linux => {
                let packages: Vec<&str> = missing
                    .iter()
                    .map(|m| if m == "bwrap" { "bubblewrap" } else { m.as_str() })
                    .collect();
                format!(
                    "Install the isolation backend:\n\
                     \n\
                       Ubuntu/Debian: sudo apt-get install {deps}\n\
                       Fedora:        sudo dnf install {deps}\n\
                       Arch:          sudo pacman -S {deps}\n\
                     \n\
                     Or set `sandbox.isolate = false` to run generated code unisolated.",
                    deps = packages.join(" ")
                )
            }
            _ => "sandbox-exec ships with macOS; check that /usr/bin is on PATH.".to_string(),
        };

        SandboxStatus::MissingDependency {
            platform,
            missing,
            install_hint,
        }
    }
}

fn on_path(binary: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_file(&dir.join(binary))))
        .unwrap_or(false)
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxStatus::Available { platform } => {
                write!(f, "Sandbox available ({platform})")
            }
            SandboxStatus::MissingDependency {
                platform,
                missing,
                install_hint,
            } => {
                write!(
                    f,
                    "Sandbox unavailable on {platform}: missing {}\n\n{install_hint}",
                    missing.join(", ")
                )
            }
            SandboxStatus::Unsupported { platform_name } => {
                write!(f, "Sandbox not supported on {platform_name}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detect() {
        let platform = Platform::detect();

        #[cfg(target_os = "macos")]
        assert_eq!(platform, Platform::MacOS);

        #[cfg(target_os = "linux")]
        assert_eq!(platform, Platform::Linux);

        let _ = platform;
    }

    #[test]
    fn test_linux_all_present() {
        let status = SandboxStatus::detect_with(Platform::Linux, |_| true);
        assert!(status.is_available());
    }

    #[test]
    fn test_linux_missing_bwrap() {
        let status = SandboxStatus::detect_with(Platform::Linux, |bin| bin == "socat");
        match status {
            SandboxStatus::MissingDependency {
                missing,
                install_hint,
                ..
            } => {
                assert_eq!(missing, vec!["bwrap"]);
                assert!(install_hint.contains("bubblewrap"));
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported() {
        let status = SandboxStatus::detect_with(Platform::Unsupported, |_| true);
        assert!(!status.is_available());
        assert!(status.to_string().contains("not supported"));
    }

    #[test]
    fn test_on_path_finds_sh() {
        #[cfg(unix)]
        assert!(on_path("sh"));
        assert!(!on_path("definitely-not-a-real-binary-name"));
    }
}
