//! Analysis configuration
//!
//! Tunables for every stage, stored as JSON. Missing fields take their
//! defaults so a partial file (or `{}`) is always valid input.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_loss_window() -> usize {
    50
}

fn default_burst_threshold_secs() -> f64 {
    0.05
}

fn default_min_burst_len() -> usize {
    5
}

fn default_contamination() -> f64 {
    0.1
}

fn default_outlier_seed() -> u64 {
    42
}

fn default_outlier_trees() -> usize {
    100
}

fn default_outlier_max_samples() -> usize {
    256
}

fn default_long_setup_secs() -> f64 {
    1.0
}

fn default_high_jitter_secs() -> f64 {
    0.05
}

fn default_significant_loss() -> f64 {
    0.05
}

/// How packets are attributed to calls during reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMode {
    /// Every packet belongs to the most recently opened call
    #[default]
    MostRecent,
    /// Signaling routed by its own Call-ID, media pinned per SSRC
    CorrelationToken,
}

/// Tunables for call reconstruction, metrics and anomaly detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Media packets per sliding loss window
    #[serde(default = "default_loss_window")]
    pub loss_window: usize,
    /// Maximum inter-arrival gap (seconds) inside a burst
    #[serde(default = "default_burst_threshold_secs")]
    pub burst_threshold_secs: f64,
    /// A burst is kept only when it has more members than this
    #[serde(default = "default_min_burst_len")]
    pub min_burst_len: usize,
    /// Expected outlier fraction for the isolation forest
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    /// Isolation forest RNG seed
    #[serde(default = "default_outlier_seed")]
    pub outlier_seed: u64,
    /// Number of isolation trees
    #[serde(default = "default_outlier_trees")]
    pub outlier_trees: usize,
    /// Rows sampled per isolation tree
    #[serde(default = "default_outlier_max_samples")]
    pub outlier_max_samples: usize,
    /// Setup latency (seconds) above which a call is flagged
    #[serde(default = "default_long_setup_secs")]
    pub long_setup_secs: f64,
    /// Per-stream inter-arrival std (seconds) above which jitter is flagged
    #[serde(default = "default_high_jitter_secs")]
    pub high_jitter_secs: f64,
    /// Loss window rate above which loss is flagged
    #[serde(default = "default_significant_loss")]
    pub significant_loss: f64,
    #[serde(default)]
    pub call_association: AssociationMode,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            loss_window: default_loss_window(),
            burst_threshold_secs: default_burst_threshold_secs(),
            min_burst_len: default_min_burst_len(),
            contamination: default_contamination(),
            outlier_seed: default_outlier_seed(),
            outlier_trees: default_outlier_trees(),
            outlier_max_samples: default_outlier_max_samples(),
            long_setup_secs: default_long_setup_secs(),
            high_jitter_secs: default_high_jitter_secs(),
            significant_loss: default_significant_loss(),
            call_association: AssociationMode::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded analysis config");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load and validate config from disk
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Analysis config saved");
        Ok(())
    }

    /// Reject values the analysis stages cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loss_window == 0 {
            return Err(ConfigError::Invalid("loss_window must be at least 1".into()));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ConfigError::Invalid(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.outlier_trees == 0 || self.outlier_max_samples < 2 {
            return Err(ConfigError::Invalid(
                "outlier_trees must be >= 1 and outlier_max_samples >= 2".into(),
            ));
        }
        let thresholds = [
            ("burst_threshold_secs", self.burst_threshold_secs),
            ("long_setup_secs", self.long_setup_secs),
            ("high_jitter_secs", self.high_jitter_secs),
            ("significant_loss", self.significant_loss),
        ];
        for (name, value) in thresholds {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.loss_window, 50);
        assert_eq!(config.burst_threshold_secs, 0.05);
        assert_eq!(config.outlier_seed, 42);
        assert_eq!(config.call_association, AssociationMode::MostRecent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = r#"{"loss_window": 20, "call_association": "correlation_token"}"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.loss_window, 20);
        assert_eq!(config.call_association, AssociationMode::CorrelationToken);
        assert_eq!(config.contamination, 0.1);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        config.loss_window = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AnalysisConfig::default();
        config.contamination = 0.9;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.high_jitter_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AnalysisConfig {
            loss_window: 32,
            outlier_seed: 7,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = AnalysisConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            AnalysisConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(AnalysisConfig::load(&path), AnalysisConfig::default());
        assert_eq!(
            AnalysisConfig::load(&dir.path().join("missing.json")),
            AnalysisConfig::default()
        );
    }
}
