//! Java executable discovery.

use std::path::{Path, PathBuf};
use tracing::debug;

/// JVM locations checked on macOS when `java` is not on `PATH`.
const MACOS_CANDIDATES: &[&str] = &[
    "/Library/Java/JavaVirtualMachines/jdk-17.jdk/Contents/Home/bin/java",
    "/Library/Java/JavaVirtualMachines/jdk-21.jdk/Contents/Home/bin/java",
    "/opt/homebrew/opt/openjdk/bin/java",
    "/usr/local/opt/openjdk/bin/java",
    "/usr/bin/java",
];

/// Locates a Java executable: `PATH` first, then well-known macOS installs,
/// finally the bare `java` name for the OS to resolve.
pub fn find_java() -> PathBuf {
    if let Ok(path) = which::which("java") {
        debug!("Found java on PATH: {path:?}");
        return path;
    }

    if cfg!(target_os = "macos")
        && let Some(path) = first_existing(MACOS_CANDIDATES)
    {
        debug!("Found java at {path:?}");
        return path;
    }

    debug!("No java found, falling back to `java`");
    PathBuf::from("java")
}

fn first_existing(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.is_file())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_existing_skips_missing_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let java = dir.path().join("java");
        std::fs::write(&java, b"").unwrap();
        let java_str = java.to_str().unwrap();

        assert_eq!(
            first_existing(&["/definitely/not/here/java", java_str]),
            Some(java.clone())
        );
        assert_eq!(first_existing(&["/definitely/not/here/java"]), None);
    }

    #[test]
    fn find_java_always_returns_something() {
        assert!(!find_java().as_os_str().is_empty());
    }
}
