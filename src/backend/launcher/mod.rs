//! Core Minecraft launcher functionality.

/// Player accounts.
pub mod account;
/// HTTP downloading with retries.
pub mod downloader;
/// Installation of versions, libraries, natives and assets.
pub mod installer;
/// The launcher facade.
pub mod launcher;
/// Data models and structures.
pub mod models;
/// Status reporting.
pub mod progress;
/// Rule evaluation.
pub mod rules;
/// Version resolution.
pub mod versions;

#[cfg(test)]
pub(crate) mod testing;

pub use account::{Account, AccountKind};
pub use installer::Installer;
pub use launcher::MinecraftLauncher;
pub use progress::{ChannelSink, StatusSink};
pub use versions::{DescriptorSource, DiskSource, ResolvedVersion, resolve};
