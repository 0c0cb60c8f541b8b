//! Installation of a resolved version: client jars, libraries, natives and
//! assets.
//!
//! Every step checks for the file first and only fetches what is missing, so
//! an interrupted install resumes where it stopped and a repeated install
//! performs no network work.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::downloader::{Fetcher, read_json};
use super::models::{AssetIndex, AssetManifest, MergedDescriptor, VersionDetails, join_url};
use super::progress::StatusSink;
use super::rules::FeatureSet;
use super::versions::{DescriptorSource, ResolvedVersion, resolve};
use crate::backend::utils::archive_utils::extract_natives;
use crate::backend::utils::config::UrlConfig;
use crate::backend::utils::file_utils::{enclosed_path, ensure_parent_directory, is_present};
use crate::backend::utils::os::Platform;
use crate::backend::utils::paths::GameLayout;
use crate::utils::error::{FetchError, InstallCause, InstallError, InstallStage};

/// Asset index ids that predate the `virtual` flag but need a virtual tree.
const LEGACY_INDEXES: [&str; 2] = ["legacy", "pre-1.6"];

pub struct Installer {
    layout: GameLayout,
    platform: Platform,
    features: FeatureSet,
    fetcher: Arc<dyn Fetcher>,
    source: Arc<dyn DescriptorSource>,
    assets_base: String,
    libraries_base: String,
}

impl Installer {
    pub fn new(
        layout: GameLayout,
        platform: Platform,
        fetcher: Arc<dyn Fetcher>,
        source: Arc<dyn DescriptorSource>,
    ) -> Self {
        let urls = UrlConfig::default();
        Self {
            layout,
            platform,
            features: FeatureSet::new(),
            fetcher,
            source,
            assets_base: urls.assets,
            libraries_base: urls.libraries,
        }
    }

    pub fn with_urls(mut self, urls: &UrlConfig) -> Self {
        self.assets_base = urls.assets.clone();
        self.libraries_base = urls.libraries.clone();
        self
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    /// Installs `version_id` and all of its ancestors, root first.
    pub async fn install(
        &self,
        version_id: &str,
        status: &dyn StatusSink,
    ) -> Result<ResolvedVersion, InstallError> {
        status.status(&format!("Checking version {version_id}..."));
        let resolved = resolve(self.source.as_ref(), version_id)
            .await
            .map_err(|e| InstallError::new(version_id, InstallStage::Resolve, e))?;

        let mut installed_index: Option<String> = None;
        for (index, details) in resolved.chain.iter().enumerate() {
            let view = resolved.merged_through(index);
            info!("Installing {} ({}/{})", details.id, index + 1, resolved.chain.len());

            self.install_client_jar(details, status).await?;
            self.install_libraries(&details.id, &view, status).await?;

            if let Some(asset_index) = &view.asset_index
                && installed_index.as_deref() != Some(asset_index.id.as_str())
            {
                self.install_assets(&details.id, asset_index, status).await?;
                installed_index = Some(asset_index.id.clone());
            }
        }

        status.status(&format!("Version {version_id} is installed"));
        info!("Version {version_id} installed");
        Ok(resolved)
    }

    /// Fetches `url` unless `path` already exists. Returns whether it fetched.
    async fn fetch_missing(
        &self,
        url: &str,
        path: &Path,
        expected_sha1: Option<&str>,
    ) -> Result<bool, FetchError> {
        if is_present(path).await {
            debug!("Already present: {path:?}");
            return Ok(false);
        }
        self.fetcher.fetch(url, path, expected_sha1).await?;
        Ok(true)
    }

    async fn install_client_jar(
        &self,
        details: &VersionDetails,
        status: &dyn StatusSink,
    ) -> Result<(), InstallError> {
        let Some(client) = details.downloads.as_ref().and_then(|d| d.client.as_ref()) else {
            debug!("{} declares no client jar", details.id);
            return Ok(());
        };

        let jar = self.layout.version_jar(&details.id);
        let fetched = self
            .fetch_missing(&client.url, &jar, client.sha1.as_deref())
            .await
            .map_err(failed(&details.id, InstallStage::ClientJar))?;
        if fetched {
            status.status(&format!("Downloaded client {}", details.id));
        }
        Ok(())
    }

    async fn install_libraries(
        &self,
        version_id: &str,
        view: &MergedDescriptor,
        status: &dyn StatusSink,
    ) -> Result<(), InstallError> {
        let natives_dir = self.layout.natives_dir(version_id);

        for library in &view.libraries {
            if !library.is_allowed(&self.platform, &self.features) {
                debug!("Skipping {} on {}", library.name, self.platform);
                continue;
            }

            if let Some(artifact) = library.classpath_artifact(&self.libraries_base) {
                let path = self.layout.library(&artifact.path);
                let fetched = self
                    .fetch_missing(&artifact.url, &path, artifact.sha1.as_deref())
                    .await
                    .map_err(failed(version_id, InstallStage::Libraries))?;
                if fetched {
                    status.status(&format!("Downloaded {}", library.name));
                }
            }

            if let Some(native) = library.native_artifact(&self.platform, &self.libraries_base) {
                let archive = self.layout.library(&native.path);
                let fetched = self
                    .fetch_missing(&native.url, &archive, native.sha1.as_deref())
                    .await
                    .map_err(failed(version_id, InstallStage::Natives))?;
                if fetched {
                    status.status(&format!("Downloaded natives for {}", library.name));
                }
                extract_natives(&archive, &natives_dir, library.extract_excludes())
                    .await
                    .map_err(failed(version_id, InstallStage::Natives))?;
            }
        }
        Ok(())
    }

    async fn install_assets(
        &self,
        version_id: &str,
        asset_index: &AssetIndex,
        status: &dyn StatusSink,
    ) -> Result<(), InstallError> {
        let index_path = self.layout.asset_index(&asset_index.id);

        if self
            .fetch_missing(&asset_index.url, &index_path, asset_index.sha1.as_deref())
            .await
            .map_err(failed(version_id, InstallStage::AssetIndex))?
        {
            status.status(&format!("Downloaded asset index {}", asset_index.id));
        }
        let manifest: AssetManifest = read_json::<_, InstallCause>(&index_path)
            .await
            .map_err(failed(version_id, InstallStage::AssetIndex))?;

        let total = manifest.objects.len();
        let virtual_dir = (manifest.is_virtual
            || LEGACY_INDEXES.contains(&asset_index.id.as_str()))
        .then(|| self.layout.virtual_assets_dir(&asset_index.id));
        let resources_dir = manifest
            .map_to_resources
            .then(|| self.layout.resources_dir());

        let mut fetched_count = 0;
        for (name, object) in &manifest.objects {
            let Some(shard) = object.shard_path() else {
                warn!("Skipping asset {name} with malformed hash {:?}", object.hash);
                continue;
            };
            let path = self.layout.asset_object(&shard);
            let url = join_url(&self.assets_base, &shard);

            if self
                .fetch_missing(&url, &path, Some(&object.hash))
                .await
                .map_err(failed(version_id, InstallStage::Assets))?
            {
                fetched_count += 1;
                status.status(&format!("Downloaded asset {fetched_count} ({name}) of {total}"));
            }

            let copies = [&virtual_dir, &resources_dir];
            if copies.iter().all(|dir| dir.is_none()) {
                continue;
            }
            let Some(relative) = enclosed_path(name) else {
                warn!("Not copying asset {name:?}: name escapes the asset tree");
                continue;
            };
            for dir in copies.into_iter().flatten() {
                let target = dir.join(&relative);
                if is_present(&target).await {
                    continue;
                }
                ensure_parent_directory(&target)
                    .await
                    .map_err(failed(version_id, InstallStage::Assets))?;
                tokio::fs::copy(&path, &target)
                    .await
                    .map_err(failed(version_id, InstallStage::Assets))?;
            }
        }

        info!("Assets for {}: {fetched_count} of {total} downloaded", asset_index.id);
        Ok(())
    }
}

/// Maps a step's error into an [`InstallError`] for `version_id` at `stage`.
fn failed<E: Into<InstallCause>>(
    version_id: &str,
    stage: InstallStage,
) -> impl Fn(E) -> InstallError + '_ {
    move |e| InstallError::new(version_id, stage, e)
}
