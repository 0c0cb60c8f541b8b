use sha1::{Digest, Sha1};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Ensures a directory exists, creating it and all parent directories if necessary.
pub async fn ensure_directory<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    let path = path.as_ref();
    if !fs::try_exists(path).await? {
        fs::create_dir_all(path).await?;
        debug!("Created directory: {path:?}");
    }
    Ok(())
}

/// Ensures the parent directory of a file exists.
pub async fn ensure_parent_directory<P: AsRef<Path>>(file_path: P) -> std::io::Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        ensure_directory(parent).await?;
    }
    Ok(())
}

/// Presence check used as the "already installed" test.
pub async fn is_present<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

/// Sibling path a download is staged in before being renamed into place.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Removes a file if it exists.
pub async fn remove_file_if_exists<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => {
            debug!("Removed file: {:?}", path.as_ref());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// `name` as a relative path that stays below whatever directory it is
/// joined onto: no root, drive prefix or `..` components.
pub fn enclosed_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut components = path.components().peekable();
    components.peek()?;
    components
        .all(|component| matches!(component, Component::Normal(_)))
        .then(|| path.to_path_buf())
}

/// Hex-encoded SHA-1 of `bytes`.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_keeps_directory_and_extension() {
        let path = Path::new("/mc/libraries/a/b-1.jar");
        assert_eq!(partial_path(path), PathBuf::from("/mc/libraries/a/b-1.jar.part"));
    }

    #[test]
    fn sha1_of_known_input() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn enclosed_path_rejects_escapes() {
        assert_eq!(
            enclosed_path("minecraft/sounds/a.ogg"),
            Some(PathBuf::from("minecraft/sounds/a.ogg"))
        );
        assert_eq!(enclosed_path("../../../escaped.txt"), None);
        assert_eq!(enclosed_path("sounds/../../x"), None);
        assert_eq!(enclosed_path("/etc/passwd"), None);
        assert_eq!(enclosed_path(""), None);
    }

    #[tokio::test]
    async fn presence_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_present(dir.path()).await);
        let file = dir.path().join("x");
        tokio::fs::write(&file, b"1").await.unwrap();
        assert!(is_present(&file).await);
        remove_file_if_exists(&file).await.unwrap();
        remove_file_if_exists(&file).await.unwrap();
        assert!(!is_present(&file).await);
    }
}
