use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::backend::launcher::downloader::RetryPolicy;
use crate::backend::utils::paths::{GameLayout, default_root_dir};
use crate::utils::error::{Error, Result};

/// File name looked up under the installation root.
pub const CONFIG_FILE: &str = "launcher_config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Installation root holding versions, libraries and assets.
    pub root_dir: PathBuf,
    /// Working directory of the game, defaults to `root_dir`.
    pub game_dir: Option<PathBuf>,
    pub java_path: Option<PathBuf>,
    pub memory: MemoryConfig,
    /// Extra JVM arguments placed before the manifest's.
    pub jvm_args: Vec<String>,
    pub use_rosetta: bool,
    pub download: DownloadConfig,
    pub urls: UrlConfig,
    pub launcher_name: String,
    pub launcher_version: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub min_mb: u32,
    pub max_mb: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    pub version_manifest: String,
    pub assets: String,
    pub libraries: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir().unwrap_or_else(|_| PathBuf::from(".minecraft")),
            game_dir: None,
            java_path: None,
            memory: MemoryConfig::default(),
            jvm_args: Vec::new(),
            use_rosetta: false,
            download: DownloadConfig::default(),
            urls: UrlConfig::default(),
            launcher_name: "CatClient".to_string(),
            launcher_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            min_mb: 512,
            max_mb: 2048,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            timeout_secs: 60,
        }
    }
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            version_manifest: "https://launchermeta.mojang.com/mc/game/version_manifest_v2.json"
                .to_string(),
            assets: "https://resources.download.minecraft.net/".to_string(),
            libraries: "https://libraries.minecraft.net/".to_string(),
        }
    }
}

impl DownloadConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LauncherConfig {
    /// Defaults rooted at `root_dir`.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Reads `path`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {path:?}, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(Error::ConfigIo {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Reads `<root>/launcher_config.json`, keeping `root` as the root.
    pub async fn load_from_root(root: &Path) -> Result<Self> {
        let mut config = Self::load(&root.join(CONFIG_FILE)).await?;
        config.root_dir = root.to_path_buf();
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let io_error = |source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_vec_pretty(self).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(path, json).await.map_err(io_error)
    }

    pub fn layout(&self) -> GameLayout {
        let layout = GameLayout::new(&self.root_dir);
        match &self.game_dir {
            Some(game_dir) => layout.with_game_dir(game_dir),
            None => layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig::load_from_root(dir.path()).await.unwrap();
        assert_eq!(config.root_dir, dir.path());
        assert_eq!(config.download.max_attempts, 3);
        assert_eq!(config.launcher_name, "CatClient");
        assert!(config.urls.assets.ends_with('/'));
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(&path, r#"{"memory": {"max_mb": 4096}, "use_rosetta": true}"#)
            .await
            .unwrap();

        let config = LauncherConfig::load(&path).await.unwrap();
        assert_eq!(config.memory.max_mb, 4096);
        assert_eq!(config.memory.min_mb, 512);
        assert!(config.use_rosetta);
        assert_eq!(config.download.timeout(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(&path, "{").await.unwrap();
        assert!(matches!(
            LauncherConfig::load(&path).await,
            Err(Error::ConfigParse { .. })
        ));
    }

    #[tokio::test]
    async fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = LauncherConfig::with_root(dir.path());
        config.jvm_args = vec!["-XX:+UseZGC".into()];
        config.save(&path).await.unwrap();

        let loaded = LauncherConfig::load(&path).await.unwrap();
        assert_eq!(loaded.jvm_args, ["-XX:+UseZGC"]);
    }

    #[test]
    fn retry_policy_follows_download_settings() {
        let policy = DownloadConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn layout_uses_custom_game_dir() {
        let mut config = LauncherConfig::with_root("/mc");
        config.game_dir = Some("/play".into());
        assert_eq!(config.layout().game_dir(), Path::new("/play"));
        assert_eq!(config.layout().root(), Path::new("/mc"));
    }
}
