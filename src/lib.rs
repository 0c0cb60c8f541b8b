//! Installs and launches Minecraft versions, including inheritance-based
//! profiles such as Forge and Fabric.
//!
//! The pipeline is: resolve a version's inheritance chain, install the files
//! each ancestor declares, then build and spawn the Java command.

pub mod backend;
pub mod utils;

pub use backend::launcher::{Account, AccountKind, MinecraftLauncher};
pub use backend::utils::command::{CommandLine, LaunchOptions};
pub use backend::utils::config::LauncherConfig;
pub use utils::error::{Error, Result};
