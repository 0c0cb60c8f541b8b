//! The launcher facade tying resolution, installation and command building
//! together.

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tracing::{error, info, warn};

use super::account::Account;
use super::downloader::{Fetcher, HttpDownloader};
use super::installer::Installer;
use super::models::VersionInfo;
use super::progress::StatusSink;
use super::versions::{DiskSource, ResolvedVersion, resolve};
use crate::backend::utils::command::{CommandBuilder, CommandLine, LaunchOptions};
use crate::backend::utils::config::LauncherConfig;
use crate::backend::utils::java::find_java;
use crate::backend::utils::os::Platform;
use crate::backend::utils::paths::GameLayout;
use crate::utils::error::{Error, ResolutionError, Result};

/// Main Minecraft launcher that handles installing and launching versions.
pub struct MinecraftLauncher {
    config: LauncherConfig,
    layout: GameLayout,
    platform: Platform,
    source: Arc<DiskSource>,
    installer: Installer,
}

impl MinecraftLauncher {
    pub fn new(config: LauncherConfig) -> Result<Self> {
        let downloader =
            HttpDownloader::new(config.download.retry_policy(), config.download.timeout())?;
        Ok(Self::with_fetcher(config, Platform::current(), Arc::new(downloader)))
    }

    /// Builds a launcher over any [`Fetcher`] and an explicit platform.
    pub fn with_fetcher(
        config: LauncherConfig,
        platform: Platform,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let layout = config.layout();
        let source = Arc::new(DiskSource::new(
            layout.clone(),
            Arc::clone(&fetcher),
            &config.urls.version_manifest,
        ));
        let installer = Installer::new(layout.clone(), platform, fetcher, source.clone())
            .with_urls(&config.urls);

        Self {
            config,
            layout,
            platform,
            source,
            installer,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Versions listed in the index, optionally filtered by type.
    pub async fn available_versions(&self, kind: Option<&str>) -> Result<Vec<VersionInfo>> {
        self.source
            .available_versions(kind)
            .await
            .map_err(|cause| ResolutionError::new("version index", cause).into())
    }

    /// Re-fetches the version index.
    pub async fn refresh_versions(&self) -> Result<()> {
        self.source
            .refresh_index()
            .await
            .map_err(|cause| ResolutionError::new("version index", cause))?;
        Ok(())
    }

    pub async fn install(
        &self,
        version_id: &str,
        status: &dyn StatusSink,
    ) -> Result<ResolvedVersion> {
        Ok(self.installer.install(version_id, status).await?)
    }

    /// Launch options seeded from the config; callers override per launch.
    pub fn default_options(&self) -> LaunchOptions {
        LaunchOptions {
            java_path: self.config.java_path.clone().unwrap_or_else(find_java),
            max_memory_mb: self.config.memory.max_mb,
            min_memory_mb: Some(self.config.memory.min_mb),
            jvm_args: self.config.jvm_args.clone(),
            use_rosetta: self.config.use_rosetta,
            launcher_name: self.config.launcher_name.clone(),
            launcher_version: self.config.launcher_version.clone(),
            ..LaunchOptions::default()
        }
    }

    /// Builds the command for an installed (or at least resolvable) version.
    pub async fn build_command(
        &self,
        version_id: &str,
        account: &Account,
        options: &LaunchOptions,
    ) -> Result<CommandLine> {
        let resolved = resolve(self.source.as_ref(), version_id).await?;

        // The builder probes the install tree with blocking filesystem calls.
        let layout = self.layout.clone();
        let platform = self.platform;
        let account = account.clone();
        let options = options.clone();
        let command = tokio::task::spawn_blocking(move || {
            CommandBuilder::new(&layout, platform, &resolved.merged)
                .account(&account)
                .options(&options)
                .build()
        })
        .await??;

        for warning in &command.warnings {
            warn!("{warning}");
        }
        Ok(command)
    }

    /// Installs, builds the command and starts the game.
    ///
    /// The game's output is forwarded to the log; the child is returned so
    /// the caller decides whether to wait for it.
    pub async fn launch(
        &self,
        version_id: &str,
        account: &Account,
        options: &LaunchOptions,
        status: &dyn StatusSink,
    ) -> Result<Child> {
        self.install(version_id, status).await?;
        let command = self.build_command(version_id, account, options).await?;

        status.status(&format!("Starting {version_id}..."));
        info!("Launching {version_id}: {command}");
        let child = spawn(&command)?;
        status.status(&format!("{version_id} started"));
        Ok(child)
    }
}

/// Starts `command` with its output forwarded to the log.
pub fn spawn(command: &CommandLine) -> Result<Child> {
    std::fs::create_dir_all(&command.working_dir).map_err(Error::Launch)?;

    let mut child = command
        .to_command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(Error::Launch)?;

    if let Some(pid) = child.id() {
        info!("Minecraft process started with PID: {pid}");
    }
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_output(stdout, false));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output(stderr, true));
    }
    Ok(child)
}

async fn forward_output<R>(stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr || line.contains("ERROR") || line.contains("FATAL") {
            error!("MC: {line}");
        } else if line.contains("WARN") {
            warn!("MC: {line}");
        } else {
            info!("MC: {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::launcher::testing::MemoryFetcher;
    use crate::backend::utils::os::{Arch, Os};
    use crate::utils::error::BuildError;
    use serde_json::json;

    const INDEX_URL: &str = "https://launchermeta.mojang.com/mc/game/version_manifest_v2.json";

    fn launcher(root: &std::path::Path, fetcher: MemoryFetcher) -> MinecraftLauncher {
        MinecraftLauncher::with_fetcher(
            LauncherConfig::with_root(root),
            Platform::new(Os::Linux, Arch::X86_64),
            Arc::new(fetcher),
        )
    }

    fn fetcher() -> MemoryFetcher {
        MemoryFetcher::default()
            .with(
                INDEX_URL,
                json!({"versions": [
                    {"id": "1.20.1", "type": "release", "url": "https://meta.test/1.20.1.json"},
                    {"id": "23w31a", "type": "snapshot", "url": "https://meta.test/23w31a.json"}
                ]})
                .to_string(),
            )
            .with(
                "https://meta.test/1.20.1.json",
                json!({
                    "id": "1.20.1",
                    "type": "release",
                    "mainClass": "net.minecraft.client.main.Main",
                    "downloads": {"client": {"url": "https://piston.test/client.jar"}},
                    "arguments": {"game": ["--username", "${auth_player_name}", "--version", "${version_name}"]}
                })
                .to_string(),
            )
            .with("https://piston.test/client.jar", "jar")
    }

    #[tokio::test]
    async fn lists_versions_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher(dir.path(), fetcher());
        let snapshots = launcher.available_versions(Some("snapshot")).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, "23w31a");
        assert_eq!(launcher.available_versions(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn install_then_build_command() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher(dir.path(), fetcher());
        launcher.install("1.20.1", &()).await.unwrap();

        let options = LaunchOptions {
            java_path: "/usr/bin/java".into(),
            ..LaunchOptions::default()
        };
        let command = launcher
            .build_command("1.20.1", &Account::offline("Steve"), &options)
            .await
            .unwrap();

        let main = command
            .args
            .iter()
            .position(|arg| arg == "net.minecraft.client.main.Main")
            .unwrap();
        assert_eq!(
            &command.args[main + 1..],
            ["--username", "Steve", "--version", "1.20.1"]
        );
        let classpath = &command.args[main - 1];
        assert!(classpath.ends_with("versions/1.20.1/1.20.1.jar"));
        assert_eq!(command.working_dir, dir.path());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn build_command_off_the_runtime_thread() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher(dir.path(), fetcher());
        launcher.install("1.20.1", &()).await.unwrap();

        let command = launcher
            .build_command("1.20.1", &Account::offline("Alex"), &LaunchOptions::default())
            .await
            .unwrap();
        assert!(command.args.iter().any(|arg| arg == "Alex"));
        assert!(command.warnings.is_empty());
    }

    #[tokio::test]
    async fn build_command_without_main_class_is_a_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::default()
            .with(
                INDEX_URL,
                json!({"versions": [{"id": "broken", "type": "release", "url": "https://meta.test/broken.json"}]})
                    .to_string(),
            )
            .with("https://meta.test/broken.json", json!({"id": "broken"}).to_string());
        let launcher = launcher(dir.path(), fetcher);

        let err = launcher
            .build_command("broken", &Account::offline("Alex"), &LaunchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::MissingField("mainClass"))));
    }

    #[tokio::test]
    async fn unknown_version_surfaces_as_install_error() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher(dir.path(), fetcher());
        let err = launcher.install("nope", &()).await.unwrap_err();
        assert!(matches!(err, Error::Install(_)));
    }

    #[tokio::test]
    async fn default_options_follow_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LauncherConfig::with_root(dir.path());
        config.java_path = Some("/opt/java/bin/java".into());
        config.memory.max_mb = 6144;
        let launcher = MinecraftLauncher::with_fetcher(
            config,
            Platform::new(Os::Linux, Arch::X86_64),
            Arc::new(MemoryFetcher::default()),
        );

        let options = launcher.default_options();
        assert_eq!(options.java_path, std::path::PathBuf::from("/opt/java/bin/java"));
        assert_eq!(options.max_memory_mb, 6144);
        assert_eq!(options.launcher_name, "CatClient");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let command = CommandLine {
            program: "sh".into(),
            args: vec!["-c".into(), "pwd".into()],
            working_dir: dir.path().join("game"),
            warnings: Vec::new(),
        };
        let mut child = spawn(&command).unwrap();
        assert!(child.wait().await.unwrap().success());
        assert!(dir.path().join("game").is_dir());
    }
}
