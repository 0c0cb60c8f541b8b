//! Path utilities.
//!
//! Every on-disk location is derived from manifest data under a single
//! installation root, so the tree can always be re-derived and presence of a
//! file is the only "installed" marker.

use std::path::{Path, PathBuf};

use crate::utils::error::{Error, Result};

/// File name of the cached version index.
pub const VERSION_INDEX_FILE: &str = "version_manifest_v2.json";

/// Default installation root for the current OS.
pub fn default_root_dir() -> Result<PathBuf> {
    match std::env::consts::OS {
        "windows" => dirs::config_dir()
            .map(|dir| dir.join(".minecraft"))
            .ok_or(Error::NoHomeDirectory),
        "macos" => dirs::home_dir()
            .map(|home| home.join("Library/Application Support/minecraft"))
            .ok_or(Error::NoHomeDirectory),
        _ => dirs::home_dir()
            .map(|home| home.join(".minecraft"))
            .ok_or(Error::NoHomeDirectory),
    }
}

/// Directory layout of an installation.
#[derive(Debug, Clone)]
pub struct GameLayout {
    root: PathBuf,
    game_dir: PathBuf,
}

impl GameLayout {
    /// Layout rooted at `root`, which is also the working directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            game_dir: root.clone(),
            root,
        }
    }

    /// Runs the game from `game_dir` instead of the root.
    pub fn with_game_dir(mut self, game_dir: impl Into<PathBuf>) -> Self {
        self.game_dir = game_dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    pub fn version_index(&self) -> PathBuf {
        self.root.join(VERSION_INDEX_FILE)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.versions_dir().join(version_id)
    }

    pub fn version_json(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{version_id}.json"))
    }

    pub fn version_jar(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id).join(format!("{version_id}.jar"))
    }

    pub fn natives_dir(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id).join("natives")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    /// `path` is the repository-relative path from the manifest.
    pub fn library(&self, path: &str) -> PathBuf {
        self.libraries_dir().join(path)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index(&self, index_id: &str) -> PathBuf {
        self.assets_dir()
            .join("indexes")
            .join(format!("{index_id}.json"))
    }

    /// `shard_path` is `<hash[..2]>/<hash>`.
    pub fn asset_object(&self, shard_path: &str) -> PathBuf {
        self.assets_dir().join("objects").join(shard_path)
    }

    pub fn virtual_assets_dir(&self, index_id: &str) -> PathBuf {
        self.assets_dir().join("virtual").join(index_id)
    }

    /// Pre-1.6 clients read assets from `<game_dir>/resources`.
    pub fn resources_dir(&self) -> PathBuf {
        self.game_dir.join("resources")
    }
}
