//! Error handling.
//!
//! Every stage of the pipeline has its own error type so callers can tell a
//! network failure from a broken manifest or a missing main class. The crate
//! level [`Error`] wraps them for the launcher facade.

use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Why a single download attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Terminal download failure, raised once retries are used up.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch {url} after {attempts} attempt(s): {last_cause}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last_cause: AttemptError,
    },
    #[error("fetch of {url} was cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Exhausted { url, .. } | Self::Cancelled { url } => url,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolutionCause {
    #[error("version is not listed in the version index")]
    UnknownVersion,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("inheritance cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
    #[error("inheritance chain is deeper than {limit} versions")]
    TooDeep { limit: usize },
}

/// A version id could not be turned into a merged descriptor.
#[derive(Debug, Error)]
#[error("cannot resolve version {version_id}: {cause}")]
pub struct ResolutionError {
    pub version_id: String,
    #[source]
    pub cause: ResolutionCause,
}

impl ResolutionError {
    pub fn new(version_id: impl Into<String>, cause: impl Into<ResolutionCause>) -> Self {
        Self {
            version_id: version_id.into(),
            cause: cause.into(),
        }
    }

    pub const fn is_unknown_version(&self) -> bool {
        matches!(self.cause, ResolutionCause::UnknownVersion)
    }

    pub const fn is_cycle(&self) -> bool {
        matches!(self.cause, ResolutionCause::Cycle { .. })
    }
}

/// The installation step that was running when an install failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Resolve,
    ClientJar,
    Libraries,
    Natives,
    AssetIndex,
    Assets,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolve => "resolving version",
            Self::ClientJar => "downloading client jar",
            Self::Libraries => "downloading libraries",
            Self::Natives => "installing natives",
            Self::AssetIndex => "loading asset index",
            Self::Assets => "downloading assets",
        })
    }
}

#[derive(Debug, Error)]
pub enum InstallCause {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

#[derive(Debug, Error)]
#[error("installing {version_id} failed while {stage}: {cause}")]
pub struct InstallError {
    pub version_id: String,
    pub stage: InstallStage,
    #[source]
    pub cause: InstallCause,
}

impl InstallError {
    pub fn new(
        version_id: impl Into<String>,
        stage: InstallStage,
        cause: impl Into<InstallCause>,
    ) -> Self {
        Self {
            version_id: version_id.into(),
            stage,
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("descriptor does not define `{0}`")]
    MissingField(&'static str),
}

/// Crate level error returned by the launcher facade.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("failed to start the game process: {0}")]
    Launch(#[source] std::io::Error),
    #[error("cannot read config {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not determine the home directory")]
    NoHomeDirectory,
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_error_names_version_and_stage() {
        let err = InstallError::new(
            "1.20.1",
            InstallStage::Assets,
            std::io::Error::other("disk full"),
        );
        let message = err.to_string();
        assert!(message.contains("1.20.1"));
        assert!(message.contains("downloading assets"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn cycle_message_lists_chain() {
        let err = ResolutionError::new(
            "a",
            ResolutionCause::Cycle {
                chain: vec!["a".into(), "b".into(), "a".into()],
            },
        );
        assert!(err.is_cycle());
        assert!(err.to_string().contains("a -> b -> a"));
    }
}
