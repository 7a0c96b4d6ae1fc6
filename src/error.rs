//! Startup errors.
//!
//! Anything that goes wrong before the first unit is processed ends the run.
//! Per-unit failures never surface here; they are carried in the results.

use crate::config::ConfigError;
use crate::scoring::model::ArtifactError;
use crate::source::discovery::DiscoveryError;
use std::path::PathBuf;

/// Errors that prevent a run from starting.
#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    Artifacts(ArtifactError),
    Discovery(DiscoveryError),
    /// The folder holds no file with the expected extension
    NoUnits { folder: PathBuf, extension: String },
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "Configuration error: {e}"),
            StartupError::Artifacts(e) => write!(f, "Failed to load model: {e}"),
            StartupError::Discovery(e) => write!(f, "{e}"),
            StartupError::NoUnits { folder, extension } => write!(
                f,
                "No .{extension} files found in {}",
                folder.display()
            ),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Config(e) => Some(e),
            StartupError::Artifacts(e) => Some(e),
            StartupError::Discovery(e) => Some(e),
            StartupError::NoUnits { .. } => None,
        }
    }
}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        StartupError::Config(e)
    }
}

impl From<ArtifactError> for StartupError {
    fn from(e: ArtifactError) -> Self {
        StartupError::Artifacts(e)
    }
}

impl From<DiscoveryError> for StartupError {
    fn from(e: DiscoveryError) -> Self {
        StartupError::Discovery(e)
    }
}
