//! Version resolution: the version index, descriptor loading and the
//! inheritance chain merge.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::downloader::{Fetcher, fetch_json, read_json};
use super::models::{MergedDescriptor, VersionDetails, VersionInfo, VersionManifest};
use crate::backend::utils::file_utils::{is_present, remove_file_if_exists};
use crate::backend::utils::paths::GameLayout;
use crate::utils::error::{ResolutionCause, ResolutionError};

/// Upper bound on the number of versions in one inheritance chain.
pub const MAX_INHERITANCE_DEPTH: usize = 16;

/// Loads a single version descriptor by id.
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    async fn load(&self, version_id: &str) -> Result<VersionDetails, ResolutionCause>;
}

/// Descriptors from `versions/<id>/<id>.json`, fetched through the version
/// index when missing.
pub struct DiskSource {
    layout: GameLayout,
    fetcher: Arc<dyn Fetcher>,
    index_url: String,
    index: RwLock<Option<Arc<VersionManifest>>>,
}

impl DiskSource {
    pub fn new(layout: GameLayout, fetcher: Arc<dyn Fetcher>, index_url: impl Into<String>) -> Self {
        Self {
            layout,
            fetcher,
            index_url: index_url.into(),
            index: RwLock::new(None),
        }
    }

    /// The version index, read from the on-disk cache or fetched once.
    pub async fn version_index(&self) -> Result<Arc<VersionManifest>, ResolutionCause> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.index.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(self.load_index().await?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Drops the cached index and fetches a fresh copy.
    pub async fn refresh_index(&self) -> Result<Arc<VersionManifest>, ResolutionCause> {
        let mut slot = self.index.write().await;
        remove_file_if_exists(self.layout.version_index()).await?;
        let index = Arc::new(self.load_index().await?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    async fn load_index(&self) -> Result<VersionManifest, ResolutionCause> {
        let path = self.layout.version_index();
        if is_present(&path).await {
            debug!("Loading cached version index from {path:?}");
            read_json(&path).await
        } else {
            info!("Fetching version index from {}", self.index_url);
            fetch_json(self.fetcher.as_ref(), &self.index_url, &path, None).await
        }
    }

    /// Index entries, optionally filtered by type (`release`, `snapshot`, ...).
    pub async fn available_versions(
        &self,
        kind: Option<&str>,
    ) -> Result<Vec<VersionInfo>, ResolutionCause> {
        let index = self.version_index().await?;
        Ok(index
            .versions
            .iter()
            .filter(|info| kind.is_none_or(|kind| info.version_type == kind))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DescriptorSource for DiskSource {
    async fn load(&self, version_id: &str) -> Result<VersionDetails, ResolutionCause> {
        let path = self.layout.version_json(version_id);
        if is_present(&path).await {
            debug!("Using local descriptor {path:?}");
            return read_json(&path).await;
        }

        let index = self.version_index().await?;
        let info = index
            .find(version_id)
            .ok_or(ResolutionCause::UnknownVersion)?;

        info!("Fetching descriptor for {version_id}");
        fetch_json(
            self.fetcher.as_ref(),
            &info.url,
            &path,
            info.sha1.as_deref(),
        )
        .await
    }
}

/// A version together with its ancestors.
#[derive(Debug, Clone)]
pub struct ResolvedVersion {
    /// Root ancestor first, requested version last.
    pub chain: Vec<VersionDetails>,
    pub merged: MergedDescriptor,
}

impl ResolvedVersion {
    pub fn id(&self) -> &str {
        &self.merged.id
    }

    /// The merged view of `chain[..=index]`, i.e. as seen by that ancestor.
    pub fn merged_through(&self, index: usize) -> MergedDescriptor {
        let end = index.min(self.chain.len().saturating_sub(1));
        merge(&self.chain[..=end])
    }
}

/// Walks `inheritsFrom` links from `version_id` and merges the chain.
pub async fn resolve(
    source: &dyn DescriptorSource,
    version_id: &str,
) -> Result<ResolvedVersion, ResolutionError> {
    let mut chain: Vec<VersionDetails> = Vec::new();
    let mut visited: Vec<String> = Vec::new();
    let mut next = Some(version_id.to_string());

    while let Some(id) = next.take() {
        if visited.contains(&id) {
            visited.push(id);
            return Err(ResolutionError::new(
                version_id,
                ResolutionCause::Cycle { chain: visited },
            ));
        }
        if visited.len() >= MAX_INHERITANCE_DEPTH {
            return Err(ResolutionError::new(
                version_id,
                ResolutionCause::TooDeep {
                    limit: MAX_INHERITANCE_DEPTH,
                },
            ));
        }

        let mut details = source
            .load(&id)
            .await
            .map_err(|cause| ResolutionError::new(id.as_str(), cause))?;
        if details.id.is_empty() {
            details.id = id.clone();
        }

        next = details.inherits_from.clone();
        visited.push(id);
        chain.push(details);
    }

    chain.reverse();
    let merged = merge(&chain);
    debug!("Resolved {version_id}: {}", merged.lineage.join(" <- "));
    Ok(ResolvedVersion { chain, merged })
}

/// Merges a root-first chain.
///
/// Scalars: the most derived value wins. Lists: ancestors' entries first.
pub fn merge(chain: &[VersionDetails]) -> MergedDescriptor {
    let mut merged = MergedDescriptor::default();

    for details in chain {
        merged.id = details.id.clone();
        merged.lineage.insert(0, details.id.clone());

        if details.version_type.is_some() {
            merged.version_type = details.version_type.clone();
        }
        if details.main_class.is_some() {
            merged.main_class = details.main_class.clone();
        }
        if details.minecraft_arguments.is_some() {
            merged.legacy_arguments = details.minecraft_arguments.clone();
        }
        if details.asset_index.is_some() {
            merged.asset_index = details.asset_index.clone();
        }
        if details.assets.is_some() {
            merged.assets = details.assets.clone();
        }
        if details.java_version.is_some() {
            merged.java_version = details.java_version.clone();
        }

        merged.libraries.extend(details.libraries.iter().cloned());

        if let Some(arguments) = &details.arguments {
            let target = merged.arguments.get_or_insert_with(Default::default);
            target.jvm.extend(arguments.jvm.iter().cloned());
            target.game.extend(arguments.game.iter().cloned());
        }
    }

    merged
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::launcher::models::Library;
    use crate::backend::launcher::testing::MemoryFetcher;
    use std::collections::HashMap;

    /// In-memory descriptors keyed by id.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        pub descriptors: HashMap<String, VersionDetails>,
    }

    impl MemorySource {
        pub fn with(mut self, details: VersionDetails) -> Self {
            self.descriptors.insert(details.id.clone(), details);
            self
        }
    }

    #[async_trait]
    impl DescriptorSource for MemorySource {
        async fn load(&self, version_id: &str) -> Result<VersionDetails, ResolutionCause> {
            self.descriptors
                .get(version_id)
                .cloned()
                .ok_or(ResolutionCause::UnknownVersion)
        }
    }

    fn library(name: &str) -> Library {
        Library {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn version(id: &str, parent: Option<&str>, libraries: &[&str]) -> VersionDetails {
        VersionDetails {
            id: id.into(),
            inherits_from: parent.map(str::to_string),
            libraries: libraries.iter().map(|name| library(name)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn libraries_are_ordered_parent_first() {
        let source = MemorySource::default()
            .with(version("1.20.1", None, &["a:a:1", "b:b:1"]))
            .with(version("forge", Some("1.20.1"), &["f:f:1"]))
            .with(version("modpack", Some("forge"), &["m:m:1"]));

        let resolved = resolve(&source, "modpack").await.unwrap();
        let names: Vec<_> = resolved
            .merged
            .libraries
            .iter()
            .map(|lib| lib.name.as_str())
            .collect();

        assert_eq!(names, ["a:a:1", "b:b:1", "f:f:1", "m:m:1"]);
        assert_eq!(resolved.merged.lineage, ["modpack", "forge", "1.20.1"]);
        assert_eq!(resolved.chain.first().unwrap().id, "1.20.1");
        assert_eq!(resolved.id(), "modpack");
    }

    #[tokio::test]
    async fn scalars_prefer_the_child() {
        let mut parent = version("1.12.2", None, &[]);
        parent.main_class = Some("net.minecraft.client.main.Main".into());
        parent.assets = Some("1.12".into());
        parent.minecraft_arguments = Some("--username ${auth_player_name}".into());
        let mut child = version("forge", Some("1.12.2"), &[]);
        child.main_class = Some("net.minecraft.launchwrapper.Launch".into());

        let source = MemorySource::default().with(parent).with(child);
        let resolved = resolve(&source, "forge").await.unwrap();

        assert_eq!(
            resolved.merged.main_class.as_deref(),
            Some("net.minecraft.launchwrapper.Launch")
        );
        assert_eq!(resolved.merged.assets.as_deref(), Some("1.12"));
        assert!(resolved.merged.legacy_arguments.is_some());

        let root_view = resolved.merged_through(0);
        assert_eq!(
            root_view.main_class.as_deref(),
            Some("net.minecraft.client.main.Main")
        );
        assert_eq!(root_view.id, "1.12.2");
    }

    #[tokio::test]
    async fn inheritance_cycle_is_reported() {
        let source = MemorySource::default()
            .with(version("a", Some("b"), &[]))
            .with(version("b", Some("a"), &[]));

        let err = resolve(&source, "a").await.unwrap_err();
        assert!(err.is_cycle());
        match err.cause {
            ResolutionCause::Cycle { chain } => assert_eq!(chain, ["a", "b", "a"]),
            other => panic!("unexpected cause: {other}"),
        }
    }

    #[tokio::test]
    async fn overly_deep_chain_is_rejected() {
        let mut source = MemorySource::default();
        for depth in 0..=MAX_INHERITANCE_DEPTH {
            let parent = (depth > 0).then(|| format!("v{}", depth - 1));
            source = source.with(version(&format!("v{depth}"), parent.as_deref(), &[]));
        }

        let err = resolve(&source, &format!("v{MAX_INHERITANCE_DEPTH}"))
            .await
            .unwrap_err();
        assert!(matches!(err.cause, ResolutionCause::TooDeep { .. }));

        let ok = resolve(&source, &format!("v{}", MAX_INHERITANCE_DEPTH - 1)).await;
        assert_eq!(ok.unwrap().chain.len(), MAX_INHERITANCE_DEPTH);
    }

    #[tokio::test]
    async fn missing_parent_names_the_parent() {
        let source = MemorySource::default().with(version("fabric", Some("1.99"), &[]));
        let err = resolve(&source, "fabric").await.unwrap_err();
        assert!(err.is_unknown_version());
        assert_eq!(err.version_id, "1.99");
    }

    const INDEX_URL: &str = "https://meta.test/version_manifest_v2.json";

    fn index_json() -> String {
        serde_json::json!({
            "latest": {"release": "1.20.1", "snapshot": "23w31a"},
            "versions": [
                {"id": "1.20.1", "type": "release", "url": "https://meta.test/1.20.1.json"},
                {"id": "23w31a", "type": "snapshot", "url": "https://meta.test/23w31a.json"}
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn disk_source_fetches_index_once_and_caches_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        let fetcher = Arc::new(
            MemoryFetcher::default()
                .with(INDEX_URL, index_json())
                .with(
                    "https://meta.test/1.20.1.json",
                    r#"{"id": "1.20.1", "mainClass": "net.minecraft.client.main.Main"}"#,
                ),
        );
        let source = DiskSource::new(layout.clone(), fetcher.clone(), INDEX_URL);

        let details = source.load("1.20.1").await.unwrap();
        assert_eq!(details.main_class.as_deref(), Some("net.minecraft.client.main.Main"));
        assert!(layout.version_json("1.20.1").is_file());
        assert!(layout.version_index().is_file());

        source.load("1.20.1").await.unwrap();
        let releases = source.available_versions(Some("release")).await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(fetcher.calls(), 2);

        let err = source.load("nope").await.unwrap_err();
        assert!(matches!(err, ResolutionCause::UnknownVersion));
    }

    #[tokio::test]
    async fn refresh_refetches_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MemoryFetcher::default().with(INDEX_URL, index_json()));
        let source = DiskSource::new(GameLayout::new(dir.path()), fetcher.clone(), INDEX_URL);

        source.version_index().await.unwrap();
        let index = source.refresh_index().await.unwrap();
        assert_eq!(index.versions.len(), 2);
        assert_eq!(fetcher.calls(), 2);
    }
}
