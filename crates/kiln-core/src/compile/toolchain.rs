//! Toolchain and host shell selection.

use std::path::{Path, PathBuf};

/// Extension of object files the toolchain leaves in the intermediate directory.
pub const OBJECT_FILE_EXTENSION: &str = ".o";

/// The toolchain used when none is configured.
pub fn default_toolchain() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "clang++"
    }
    #[cfg(not(target_os = "macos"))]
    {
        "g++"
    }
}

/// Look up a toolchain executable on `PATH`.
///
/// Paths containing a directory component are checked as given.
pub fn find_toolchain(toolchain: &Path) -> Option<PathBuf> {
    which::which(toolchain).ok()
}

/// The shell process hosting compiles.
///
/// Commands are written to its stdin one line at a time, so it must accept
/// `cd` and `echo` and must not echo its input back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Shell executable
    pub program: PathBuf,

    /// Arguments passed to the shell
    pub args: Vec<String>,
}

impl ShellCommand {
    /// Create a shell command from a program and its arguments.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The platform shell: `sh` on Unix, `cmd /q` on Windows.
    pub fn platform_default() -> Self {
        #[cfg(windows)]
        {
            Self::new("cmd", ["/q"])
        }
        #[cfg(not(windows))]
        {
            Self::new("sh", Vec::<String>::new())
        }
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Platform-specific dynamic library extension.
pub fn dylib_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dll"
    }
    #[cfg(target_os = "macos")]
    {
        "dylib"
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "so"
    }
}

/// Platform-specific dynamic library prefix.
pub fn dylib_prefix() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ""
    }
    #[cfg(not(target_os = "windows"))]
    {
        "lib"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_toolchain() {
        let toolchain = default_toolchain();
        assert!(toolchain.ends_with("++"));
    }

    #[test]
    fn test_missing_toolchain_not_found() {
        assert!(find_toolchain(Path::new("kiln-no-such-compiler-xyz")).is_none());
    }

    #[test]
    fn test_platform_shell() {
        let shell = ShellCommand::platform_default();
        #[cfg(unix)]
        assert_eq!(shell.program, PathBuf::from("sh"));
        #[cfg(windows)]
        assert_eq!(shell.args, vec!["/q".to_string()]);
        assert_eq!(ShellCommand::default(), shell);
    }

    #[test]
    fn test_dylib_extension() {
        let ext = dylib_extension();
        #[cfg(target_os = "linux")]
        assert_eq!(ext, "so");
        #[cfg(target_os = "macos")]
        assert_eq!(ext, "dylib");
        #[cfg(target_os = "windows")]
        assert_eq!(ext, "dll");
    }
}
