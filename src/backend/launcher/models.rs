//! Core data models for Minecraft launcher functionality.
//!
//! This module contains the data structures used to represent the version
//! index, version descriptors, libraries, assets, and the merged view of an
//! inheritance chain.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::backend::utils::os::{Arch, Platform};

/// Global version index listing every known version.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub latest: Option<LatestVersions>,
    pub versions: Vec<VersionInfo>,
}

/// Latest version information for release and snapshot.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// One entry of the version index.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionInfo {
    pub id: String,
    #[serde(rename = "type", default)]
    pub version_type: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(rename = "releaseTime", default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
}

impl VersionManifest {
    pub fn find(&self, version_id: &str) -> Option<&VersionInfo> {
        self.versions.iter().find(|v| v.id == version_id)
    }
}

/// A single version descriptor as stored in `versions/<id>/<id>.json`.
///
/// Everything except `id` is optional: child profiles (Forge, Fabric, ...)
/// only carry what they add on top of their parent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VersionDetails {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,
    #[serde(rename = "inheritsFrom", default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(rename = "mainClass", default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(rename = "minecraftArguments", default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Downloads>,
    #[serde(rename = "assetIndex", default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(rename = "javaVersion", default, skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersion>,
}

/// Command line arguments for game and JVM.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentValue>,
    #[serde(default)]
    pub jvm: Vec<ArgumentValue>,
}

/// Argument value that can be a string or conditional based on rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    String(String),
    Conditional {
        rules: Vec<Rule>,
        value: ArgumentValueInner,
    },
}

/// Inner argument value that can be a string or array.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ArgumentValueInner {
    String(String),
    Array(Vec<String>),
}

impl ArgumentValueInner {
    pub fn values(&self) -> &[String] {
        match self {
            Self::String(s) => std::slice::from_ref(s),
            Self::Array(values) => values,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

/// Rule for conditional arguments and library inclusion.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

/// Operating system rule for platform-specific conditions.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Library dependency with download information and rules.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Library {
    pub name: String,
    /// Maven repository base, used by profiles that omit `downloads`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

/// Download information for library artifacts.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

/// Downloadable artifact with optional hash and size information.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Rules for extracting native libraries.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Download information for client and server JARs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Downloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<Artifact>,
}

/// Reference to the asset index used by a version.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetIndex {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "totalSize", default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

/// Java version requirement for Minecraft.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JavaVersion {
    pub component: String,
    #[serde(rename = "majorVersion")]
    pub major_version: u8,
}

/// Asset index contents: every asset object of a version.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetManifest {
    pub objects: BTreeMap<String, AssetObject>,
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub map_to_resources: bool,
}

/// Individual asset object with hash and size.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// `<first two hex chars>/<hash>`, or `None` for a malformed hash.
    pub fn shard_path(&self) -> Option<String> {
        let shard = self.hash.get(..2)?;
        Some(format!("{shard}/{}", self.hash))
    }
}

/// Where a library file lives locally and remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    /// Path relative to the libraries directory.
    pub path: String,
    pub url: String,
    pub sha1: Option<String>,
}

impl Library {
    /// The jar this library contributes to the classpath, if any.
    pub fn classpath_artifact(&self, libraries_base: &str) -> Option<ArtifactLocation> {
        match &self.downloads {
            Some(downloads) => {
                let artifact = downloads.artifact.as_ref()?;
                let path = match &artifact.path {
                    Some(path) => path.clone(),
                    None => maven_path(&self.name, None)?,
                };
                Some(locate(artifact, path, libraries_base))
            }
            None => {
                let path = maven_path(&self.name, None)?;
                let base = self.url.as_deref().unwrap_or(libraries_base);
                Some(ArtifactLocation {
                    url: join_url(base, &path),
                    path,
                    sha1: None,
                })
            }
        }
    }

    /// The native archive for `platform`, if this library ships one.
    pub fn native_artifact(
        &self,
        platform: &Platform,
        libraries_base: &str,
    ) -> Option<ArtifactLocation> {
        let classifiers = self.downloads.as_ref()?.classifiers.as_ref()?;

        let candidates = match &self.natives {
            Some(natives) => {
                let key = natives
                    .get(platform.os_name())?
                    .replace("${arch}", platform.arch.bitness());
                if platform.arch == Arch::Arm64 {
                    vec![format!("{key}-arm64"), key]
                } else {
                    vec![key]
                }
            }
            None => platform.default_native_classifiers(),
        };

        candidates.into_iter().find_map(|classifier| {
            let artifact = classifiers.get(&classifier)?;
            let path = match &artifact.path {
                Some(path) => path.clone(),
                None => maven_path(&self.name, Some(&classifier))?,
            };
            Some(locate(artifact, path, libraries_base))
        })
    }

    pub fn extract_excludes(&self) -> &[String] {
        self.extract
            .as_ref()
            .map(|rules| rules.exclude.as_slice())
            .unwrap_or_default()
    }
}

fn locate(artifact: &Artifact, path: String, libraries_base: &str) -> ArtifactLocation {
    let url = if artifact.url.is_empty() {
        join_url(libraries_base, &path)
    } else {
        artifact.url.clone()
    };
    ArtifactLocation {
        path,
        url,
        sha1: artifact.sha1.clone(),
    }
}

/// Maps `group:artifact:version[:classifier][@ext]` to its repository path.
pub fn maven_path(coordinate: &str, classifier: Option<&str>) -> Option<String> {
    let (coordinate, extension) = match coordinate.split_once('@') {
        Some((coordinate, extension)) => (coordinate, extension),
        None => (coordinate, "jar"),
    };

    let mut parts = coordinate.split(':');
    let group = parts.next().filter(|s| !s.is_empty())?;
    let artifact = parts.next().filter(|s| !s.is_empty())?;
    let version = parts.next().filter(|s| !s.is_empty())?;
    let classifier = classifier.or_else(|| parts.next());

    let file = match classifier {
        Some(classifier) => format!("{artifact}-{version}-{classifier}.{extension}"),
        None => format!("{artifact}-{version}.{extension}"),
    };
    Some(format!(
        "{}/{artifact}/{version}/{file}",
        group.replace('.', "/")
    ))
}

/// Joins a base URL and a relative path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// The effective descriptor of a version after merging its ancestors.
#[derive(Debug, Clone, Default)]
pub struct MergedDescriptor {
    pub id: String,
    pub version_type: Option<String>,
    pub main_class: Option<String>,
    /// Ids of the version and its ancestors, leaf first.
    pub lineage: Vec<String>,
    /// Parent libraries first, then the child's.
    pub libraries: Vec<Library>,
    pub arguments: Option<Arguments>,
    pub legacy_arguments: Option<String>,
    pub asset_index: Option<AssetIndex>,
    pub assets: Option<String>,
    pub java_version: Option<JavaVersion>,
}

impl MergedDescriptor {
    /// Asset index id used for `${assets_index_name}`.
    pub fn asset_index_name(&self) -> &str {
        self.asset_index
            .as_ref()
            .map(|index| index.id.as_str())
            .or(self.assets.as_deref())
            .unwrap_or("legacy")
    }
}
