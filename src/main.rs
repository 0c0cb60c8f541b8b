use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cat_launcher::backend::launcher::{Account, AccountKind, MinecraftLauncher};
use cat_launcher::backend::utils::command::LaunchOptions;
use cat_launcher::backend::utils::config::LauncherConfig;
use cat_launcher::backend::utils::paths::default_root_dir;
use cat_launcher::utils::logging;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "cat-launcher", version, about = "Install and launch Minecraft versions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Installation root (defaults to the platform's .minecraft directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (defaults to <root>/launcher_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List versions from the version index
    Versions {
        /// Only show this type (release, snapshot, old_beta, old_alpha)
        #[arg(long)]
        kind: Option<String>,
        /// Re-fetch the index first
        #[arg(long)]
        refresh: bool,
    },
    /// Download everything a version needs
    Install { version: String },
    /// Print the launch command without running it
    Command {
        version: String,
        #[command(flatten)]
        launch: LaunchArgs,
    },
    /// Install and start a version
    Launch {
        version: String,
        #[command(flatten)]
        launch: LaunchArgs,
        /// Return as soon as the game has started
        #[arg(long)]
        detach: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AccountType {
    Offline,
    Microsoft,
    Tlauncher,
}

#[derive(Args)]
struct LaunchArgs {
    #[arg(short, long, default_value = "Player")]
    username: String,
    #[arg(long, value_enum, default_value = "offline")]
    account_type: AccountType,
    /// Account UUID (offline accounts derive one from the username)
    #[arg(long)]
    uuid: Option<String>,
    #[arg(long)]
    token: Option<String>,
    /// Maximum heap in megabytes
    #[arg(short, long)]
    memory: Option<u32>,
    #[arg(long)]
    java: Option<PathBuf>,
    /// Join this server on start
    #[arg(long)]
    server: Option<String>,
    #[arg(long, requires = "server")]
    port: Option<u16>,
    /// Run through Rosetta on Apple Silicon
    #[arg(long)]
    rosetta: bool,
    #[arg(long, requires = "height")]
    width: Option<u32>,
    #[arg(long, requires = "width")]
    height: Option<u32>,
    /// Working directory of the game
    #[arg(long)]
    game_dir: Option<PathBuf>,
}

impl LaunchArgs {
    fn account(&self) -> Result<Account> {
        let kind = match self.account_type {
            AccountType::Offline => return Ok(self.offline_account()),
            AccountType::Microsoft => AccountKind::Microsoft,
            AccountType::Tlauncher => AccountKind::TLauncher,
        };
        let Some(uuid) = self.uuid.clone() else {
            bail!("--uuid is required for non-offline accounts");
        };
        Ok(Account {
            kind,
            username: self.username.clone(),
            uuid,
            token: self.token.clone(),
        })
    }

    fn offline_account(&self) -> Account {
        let mut account = Account::offline(&self.username);
        if let Some(uuid) = &self.uuid {
            account.uuid = uuid.clone();
        }
        account
    }

    fn apply(&self, options: &mut LaunchOptions) {
        if let Some(java) = &self.java {
            options.java_path = java.clone();
        }
        if let Some(memory) = self.memory {
            options.max_memory_mb = memory;
            options.min_memory_mb = options.min_memory_mb.map(|min| min.min(memory));
        }
        options.server = self.server.clone();
        options.port = self.port;
        options.use_rosetta |= self.rosetta;
        options.resolution = self.width.zip(self.height);
    }
}

async fn load_config(cli: &Cli, game_dir: Option<&PathBuf>) -> Result<LauncherConfig> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => default_root_dir()?,
    };
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = LauncherConfig::load(path).await?;
            if cli.root.is_some() {
                config.root_dir = root;
            }
            config
        }
        None => LauncherConfig::load_from_root(&root).await?,
    };
    if let Some(game_dir) = game_dir {
        config.game_dir = Some(game_dir.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let game_dir = match &cli.command {
        Commands::Command { launch, .. } | Commands::Launch { launch, .. } => {
            launch.game_dir.as_ref()
        }
        _ => None,
    };
    let config = load_config(&cli, game_dir).await?;
    let launcher = MinecraftLauncher::new(config).context("failed to set up the launcher")?;
    let status = |message: &str| info!("{message}");

    match &cli.command {
        Commands::Versions { kind, refresh } => {
            if *refresh {
                launcher.refresh_versions().await?;
            }
            for version in launcher.available_versions(kind.as_deref()).await? {
                println!("{:<24} {}", version.id, version.version_type);
            }
        }
        Commands::Install { version } => {
            launcher.install(version, &status).await?;
        }
        Commands::Command { version, launch } => {
            let mut options = launcher.default_options();
            launch.apply(&mut options);
            let command = launcher
                .build_command(version, &launch.account()?, &options)
                .await?;
            println!("{command}");
        }
        Commands::Launch {
            version,
            launch,
            detach,
        } => {
            let mut options = launcher.default_options();
            launch.apply(&mut options);
            let mut child = launcher
                .launch(version, &launch.account()?, &options, &status)
                .await?;
            if !*detach {
                let exit = child.wait().await.context("waiting for the game")?;
                info!("Minecraft exited with {exit}");
                if !exit.success() {
                    bail!("Minecraft exited with {exit}");
                }
            }
        }
    }
    Ok(())
}
