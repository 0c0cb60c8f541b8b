//! Utility modules for the launcher backend.
//!
//! OS detection, path management, configuration and command building.

/// Native archive extraction.
pub mod archive_utils;
/// Minecraft command building utilities.
pub mod command;
/// Launcher configuration.
pub mod config;
/// File system operations and utilities.
pub mod file_utils;
/// Java executable discovery.
pub mod java;
/// OS detection and compatibility.
pub mod os;
/// Path utilities for Minecraft directories.
pub mod paths;
