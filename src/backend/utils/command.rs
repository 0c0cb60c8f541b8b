//! Minecraft command building utilities.
//!
//! Turns a merged version descriptor, an account and launch options into the
//! program, arguments and working directory of the game process. Arguments
//! are expanded from the manifest with an explicit placeholder table;
//! placeholders the table does not know are dropped instead of being passed
//! through verbatim.
//!
//! #### Example:
//! ```no_run
//! # use cat_launcher::backend::launcher::{account::Account, models::MergedDescriptor};
//! # use cat_launcher::backend::utils::{command::{CommandBuilder, LaunchOptions}, os::Platform, paths::GameLayout};
//! # fn demo(merged: &MergedDescriptor) -> Result<(), Box<dyn std::error::Error>> {
//! let layout = GameLayout::new("/home/steve/.minecraft");
//! let account = Account::offline("Steve");
//! let command = CommandBuilder::new(&layout, Platform::current(), merged)
//!     .account(&account)
//!     .options(&LaunchOptions::default())
//!     .build()?;
//! println!("{command}");
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::backend::launcher::account::Account;
use crate::backend::launcher::models::{ArgumentValue, MergedDescriptor};
use crate::backend::launcher::rules::{FeatureSet, is_allowed};
use crate::backend::utils::os::{Arch, Platform};
use crate::backend::utils::paths::GameLayout;
use crate::utils::error::BuildError;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// GC tuning applied on Apple Silicon and other arm64 hosts.
const ARM64_GC_FLAGS: [&str; 3] = [
    "-XX:+UseG1GC",
    "-XX:MaxGCPauseMillis=200",
    "-XX:ParallelGCThreads=4",
];

/// Every placeholder the builder knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    AuthPlayerName,
    VersionName,
    GameDirectory,
    AssetsRoot,
    GameAssets,
    AssetsIndexName,
    AuthUuid,
    AuthAccessToken,
    AuthSession,
    UserType,
    UserProperties,
    VersionType,
    NativesDirectory,
    Classpath,
    ClasspathSeparator,
    LibraryDirectory,
    LauncherName,
    LauncherVersion,
    ResolutionWidth,
    ResolutionHeight,
    ClientId,
    AuthXuid,
}

impl Placeholder {
    pub const ALL: [Self; 22] = [
        Self::AuthPlayerName,
        Self::VersionName,
        Self::GameDirectory,
        Self::AssetsRoot,
        Self::GameAssets,
        Self::AssetsIndexName,
        Self::AuthUuid,
        Self::AuthAccessToken,
        Self::AuthSession,
        Self::UserType,
        Self::UserProperties,
        Self::VersionType,
        Self::NativesDirectory,
        Self::Classpath,
        Self::ClasspathSeparator,
        Self::LibraryDirectory,
        Self::LauncherName,
        Self::LauncherVersion,
        Self::ResolutionWidth,
        Self::ResolutionHeight,
        Self::ClientId,
        Self::AuthXuid,
    ];

    /// Name used inside `${...}`.
    pub const fn key(self) -> &'static str {
        match self {
            Self::AuthPlayerName => "auth_player_name",
            Self::VersionName => "version_name",
            Self::GameDirectory => "game_directory",
            Self::AssetsRoot => "assets_root",
            Self::GameAssets => "game_assets",
            Self::AssetsIndexName => "assets_index_name",
            Self::AuthUuid => "auth_uuid",
            Self::AuthAccessToken => "auth_access_token",
            Self::AuthSession => "auth_session",
            Self::UserType => "user_type",
            Self::UserProperties => "user_properties",
            Self::VersionType => "version_type",
            Self::NativesDirectory => "natives_directory",
            Self::Classpath => "classpath",
            Self::ClasspathSeparator => "classpath_separator",
            Self::LibraryDirectory => "library_directory",
            Self::LauncherName => "launcher_name",
            Self::LauncherVersion => "launcher_version",
            Self::ResolutionWidth => "resolution_width",
            Self::ResolutionHeight => "resolution_height",
            Self::ClientId => "clientid",
            Self::AuthXuid => "auth_xuid",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|placeholder| placeholder.key() == key)
    }
}

/// Values for the placeholders of one launch.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderTable {
    values: HashMap<Placeholder, String>,
}

impl PlaceholderTable {
    pub fn set(&mut self, placeholder: Placeholder, value: impl Into<String>) {
        self.values.insert(placeholder, value.into());
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values.get(&placeholder).map(String::as_str)
    }
}

/// Why a template could not be fully substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// Not part of the placeholder vocabulary.
    Unknown(String),
    /// Known, but this launch has no value for it.
    Unset(Placeholder),
}

/// Replaces every `${key}` in `template`.
///
/// Fails on the first placeholder that cannot be filled; never panics.
pub fn substitute(template: &str, table: &PlaceholderTable) -> Result<String, Unresolved> {
    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let placeholder = Placeholder::from_key(key.as_str())
            .ok_or_else(|| Unresolved::Unknown(key.as_str().to_string()))?;
        let value = table
            .get(placeholder)
            .ok_or(Unresolved::Unset(placeholder))?;

        output.push_str(&template[last..whole.start()]);
        output.push_str(value);
        last = whole.end();
    }

    output.push_str(&template[last..]);
    Ok(output)
}

/// Per-launch settings that do not come from the manifest.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub java_path: PathBuf,
    pub max_memory_mb: u32,
    pub min_memory_mb: Option<u32>,
    /// Extra JVM arguments placed before the manifest's.
    pub jvm_args: Vec<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    /// Wrap the command in `arch -x86_64` on untranslated Apple Silicon.
    pub use_rosetta: bool,
    /// Window size; enables the `has_custom_resolution` feature.
    pub resolution: Option<(u32, u32)>,
    pub launcher_name: String,
    pub launcher_version: String,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            java_path: PathBuf::from("java"),
            max_memory_mb: 2048,
            min_memory_mb: None,
            jvm_args: Vec::new(),
            server: None,
            port: None,
            use_rosetta: false,
            resolution: None,
            launcher_name: "CatClient".to_string(),
            launcher_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A fully assembled game command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Arguments dropped because of unknown placeholders.
    pub warnings: Vec<String>,
}

impl CommandLine {
    pub fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).current_dir(&self.working_dir);
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Only the flags of an asset index that decide where `${game_assets}` points.
#[derive(Debug, Default, Deserialize)]
struct AssetIndexFlags {
    #[serde(rename = "virtual", default)]
    is_virtual: bool,
    #[serde(default)]
    map_to_resources: bool,
}

/// Builds the launch command for an installed version.
pub struct CommandBuilder<'a> {
    layout: &'a GameLayout,
    platform: Platform,
    descriptor: &'a MergedDescriptor,
    account: Option<&'a Account>,
    options: Option<&'a LaunchOptions>,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(layout: &'a GameLayout, platform: Platform, descriptor: &'a MergedDescriptor) -> Self {
        Self {
            layout,
            platform,
            descriptor,
            account: None,
            options: None,
        }
    }

    /// Defaults to an offline `Player` account.
    pub fn account(mut self, account: &'a Account) -> Self {
        self.account = Some(account);
        self
    }

    pub fn options(mut self, options: &'a LaunchOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn build(self) -> Result<CommandLine, BuildError> {
        let merged = self.descriptor;
        let main_class = merged
            .main_class
            .as_deref()
            .ok_or(BuildError::MissingField("mainClass"))?;

        let default_account;
        let account = match self.account {
            Some(account) => account,
            None => {
                default_account = Account::offline("Player");
                &default_account
            }
        };
        let default_options;
        let options = match self.options {
            Some(options) => options,
            None => {
                default_options = LaunchOptions::default();
                &default_options
            }
        };

        let mut features = FeatureSet::new();
        if options.resolution.is_some() {
            features = features.with("has_custom_resolution");
        }

        let natives_dir = self.layout.natives_dir(&merged.id);
        let classpath = self.classpath(&features);
        let table = self.placeholder_table(account, options, &natives_dir, &classpath);

        let mut warnings = Vec::new();
        let mut args = vec![format!("-Xmx{}M", options.max_memory_mb)];
        if let Some(min) = options.min_memory_mb {
            args.push(format!("-Xms{min}M"));
        }
        args.push(format!("-Djava.library.path={}", natives_dir.display()));
        if self.platform.arch == Arch::Arm64 {
            args.extend(ARM64_GC_FLAGS.map(String::from));
        }
        args.extend(options.jvm_args.iter().cloned());

        let (jvm_tokens, game_tokens) = match &merged.arguments {
            Some(arguments) => (
                self.allowed_values(&arguments.jvm, &features),
                self.allowed_values(&arguments.game, &features),
            ),
            None => (Vec::new(), Vec::new()),
        };

        let mut jvm = Vec::new();
        let mut tokens = jvm_tokens.into_iter().peekable();
        while let Some(raw) = tokens.next() {
            if matches!(raw, "-cp" | "-classpath") && tokens.peek() == Some(&"${classpath}") {
                tokens.next();
                continue;
            }
            push_substituted(&mut jvm, raw, &table, &mut warnings);
        }
        args.extend(jvm);

        args.push("-cp".to_string());
        args.push(classpath);
        args.push(main_class.to_string());

        let mut game = Vec::new();
        if game_tokens.is_empty()
            && let Some(legacy) = &merged.legacy_arguments
        {
            for raw in legacy.split_whitespace() {
                push_substituted(&mut game, raw, &table, &mut warnings);
            }
        } else {
            for raw in game_tokens {
                push_substituted(&mut game, raw, &table, &mut warnings);
            }
        }
        args.extend(game);

        if let Some(server) = &options.server {
            args.push("--server".to_string());
            args.push(server.clone());
            if let Some(port) = options.port {
                args.push("--port".to_string());
                args.push(port.to_string());
            }
        }

        let program = if options.use_rosetta && self.platform.needs_translation_prefix() {
            debug!("Wrapping command with arch -x86_64");
            args.splice(
                0..0,
                [
                    "-x86_64".to_string(),
                    options.java_path.to_string_lossy().into_owned(),
                ],
            );
            PathBuf::from("arch")
        } else {
            if options.use_rosetta {
                debug!("Rosetta requested but not applicable on {}", self.platform);
            }
            options.java_path.clone()
        };

        Ok(CommandLine {
            program,
            args,
            working_dir: self.layout.game_dir().to_path_buf(),
            warnings,
        })
    }

    /// Values of the argument tokens whose rules allow them, in order.
    fn allowed_values<'t>(
        &self,
        tokens: &'t [ArgumentValue],
        features: &FeatureSet,
    ) -> Vec<&'t str> {
        tokens
            .iter()
            .flat_map(|token| -> &'t [String] {
                match token {
                    ArgumentValue::String(value) => std::slice::from_ref(value),
                    ArgumentValue::Conditional { rules, value } => {
                        if is_allowed(rules, &self.platform, features) {
                            value.values()
                        } else {
                            &[]
                        }
                    }
                }
            })
            .map(String::as_str)
            .collect()
    }

    /// Installed library jars in merged order, then the version jar.
    fn classpath(&self, features: &FeatureSet) -> String {
        let mut seen = HashSet::new();
        let mut entries: Vec<PathBuf> = Vec::new();

        for library in &self.descriptor.libraries {
            if !library.is_allowed(&self.platform, features) {
                continue;
            }
            let Some(artifact) = library.classpath_artifact("") else {
                continue;
            };
            let path = self.layout.library(&artifact.path);
            if path.is_file() && seen.insert(path.clone()) {
                entries.push(path);
            }
        }

        entries.push(self.version_jar());

        let separator = self.platform.os.classpath_separator();
        entries
            .iter()
            .map(|path| path.to_string_lossy())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// The leaf's jar, or the nearest ancestor's when the leaf ships none.
    fn version_jar(&self) -> PathBuf {
        self.descriptor
            .lineage
            .iter()
            .map(|id| self.layout.version_jar(id))
            .find(|jar| jar.is_file())
            .unwrap_or_else(|| self.layout.version_jar(&self.descriptor.id))
    }

    fn game_assets_dir(&self) -> PathBuf {
        let index_id = self.descriptor.asset_index_name();
        let flags = read_asset_flags(&self.layout.asset_index(index_id));
        if flags.map_to_resources {
            self.layout.resources_dir()
        } else if flags.is_virtual || matches!(index_id, "legacy" | "pre-1.6") {
            self.layout.virtual_assets_dir(index_id)
        } else {
            self.layout.assets_dir()
        }
    }

    fn placeholder_table(
        &self,
        account: &Account,
        options: &LaunchOptions,
        natives_dir: &Path,
        classpath: &str,
    ) -> PlaceholderTable {
        use Placeholder::*;

        let merged = self.descriptor;
        let path = |p: &Path| p.to_string_lossy().into_owned();
        let mut table = PlaceholderTable::default();

        table.set(AuthPlayerName, &account.username);
        table.set(VersionName, &merged.id);
        table.set(GameDirectory, path(self.layout.game_dir()));
        table.set(AssetsRoot, path(&self.layout.assets_dir()));
        table.set(GameAssets, path(&self.game_assets_dir()));
        table.set(AssetsIndexName, merged.asset_index_name());
        table.set(AuthUuid, &account.uuid);
        table.set(AuthAccessToken, account.access_token());
        table.set(AuthSession, account.access_token());
        table.set(UserType, account.user_type());
        table.set(UserProperties, "{}");
        table.set(
            VersionType,
            merged.version_type.as_deref().unwrap_or("release"),
        );
        table.set(NativesDirectory, path(natives_dir));
        table.set(Classpath, classpath);
        table.set(
            ClasspathSeparator,
            self.platform.os.classpath_separator(),
        );
        table.set(LibraryDirectory, path(&self.layout.libraries_dir()));
        table.set(LauncherName, &options.launcher_name);
        table.set(LauncherVersion, &options.launcher_version);
        if let Some((width, height)) = options.resolution {
            table.set(ResolutionWidth, width.to_string());
            table.set(ResolutionHeight, height.to_string());
        }
        table
    }
}

fn read_asset_flags(index_path: &Path) -> AssetIndexFlags {
    std::fs::read(index_path)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Substitutes `raw` and appends it, or drops it together with the `--flag`
/// emitted right before it.
fn push_substituted(
    out: &mut Vec<String>,
    raw: &str,
    table: &PlaceholderTable,
    warnings: &mut Vec<String>,
) {
    let unresolved = match substitute(raw, table) {
        Ok(value) => {
            out.push(value);
            return;
        }
        Err(unresolved) => unresolved,
    };

    let dropped_flag = if !raw.starts_with('-')
        && out.last().is_some_and(|previous| previous.starts_with("--"))
    {
        out.pop()
    } else {
        None
    };

    match unresolved {
        Unresolved::Unknown(key) => {
            let message = match dropped_flag {
                Some(flag) => format!("dropped `{flag} {raw}`: unknown placeholder `{key}`"),
                None => format!("dropped `{raw}`: unknown placeholder `{key}`"),
            };
            warn!("{message}");
            warnings.push(message);
        }
        Unresolved::Unset(placeholder) => {
            debug!("No value for `{}`, dropping `{raw}`", placeholder.key());
        }
    }
}
