//! Configuration for the plasma fault detector.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the sheet holding the H-alpha trace in each workbook.
pub const DEFAULT_SECTION_NAME: &str = "HAlpha";

/// Time (ms) at which the analysis region starts.
pub const DEFAULT_START_TIME: f64 = 0.0;

/// Number of samples analysed from the start time onward.
pub const DEFAULT_TOTAL_SAMPLES: usize = 1500;

/// Samples per window.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Stride between consecutive window starts.
pub const DEFAULT_HOP_SIZE: usize = 80;

/// Main configuration for the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Feature extraction parameters (must match the trained model)
    pub features: FeatureConfig,

    /// Directory holding `scaler.json` and `svm_model.json`
    pub model_dir: PathBuf,

    /// Folder scanned for input units when none is given on the command line
    pub data_dir: PathBuf,

    /// File extension of input units (matched case-insensitively)
    pub extension: String,

    /// Number of worker threads (1 = strictly sequential)
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            model_dir: PathBuf::from("Models"),
            data_dir: PathBuf::from("Data"),
            extension: "xlsx".to_string(),
            workers: 1,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.features.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("plasma-fault-detector")
            .join("config.json")
    }
}

/// Parameters of the signal-to-feature reduction.
///
/// These are fixed per trained model: the values recorded in the model
/// metadata at training time have to equal the ones used at inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Sheet/section the trace is read from
    pub section_name: String,
    /// Time value that anchors the analysis region
    pub start_time: f64,
    /// Length of the analysis region in samples
    pub total_samples: usize,
    /// Window length in samples
    pub window_size: usize,
    /// Stride between windows in samples
    pub hop_size: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            section_name: DEFAULT_SECTION_NAME.to_string(),
            start_time: DEFAULT_START_TIME,
            total_samples: DEFAULT_TOTAL_SAMPLES,
            window_size: DEFAULT_WINDOW_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
        }
    }
}

impl FeatureConfig {
    /// Check that the windowing parameters describe at least one window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be positive".into()));
        }
        if self.hop_size == 0 {
            return Err(ConfigError::Invalid("hop_size must be positive".into()));
        }
        if self.window_size > self.total_samples {
            return Err(ConfigError::Invalid(format!(
                "window_size ({}) exceeds total_samples ({})",
                self.window_size, self.total_samples
            )));
        }
        if !self.start_time.is_finite() {
            return Err(ConfigError::Invalid("start_time must be finite".into()));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.features.section_name, "HAlpha");
        assert_eq!(config.features.start_time, 0.0);
        assert_eq!(config.features.total_samples, 1500);
        assert_eq!(config.features.window_size, 100);
        assert_eq!(config.features.hop_size, 80);
        assert_eq!(config.extension, "xlsx");
        assert_eq!(config.workers, 1);
        assert!(config.features.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_windows() {
        let mut features = FeatureConfig {
            hop_size: 0,
            ..Default::default()
        };
        assert!(features.validate().is_err());

        features.hop_size = 80;
        features.window_size = 0;
        assert!(features.validate().is_err());

        features.window_size = 1501;
        assert!(features.validate().is_err());

        features.window_size = 1500;
        assert!(features.validate().is_ok());
    }

    #[test]
    fn test_config_json_roundtrip_keeps_features() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.features, config.features);
        assert_eq!(parsed.model_dir, config.model_dir);
    }
}
