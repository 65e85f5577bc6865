use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logistic_regression::LogisticRegressionParams;
use crate::support_vector_machine::SvmParams;

/// Looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "medpredict.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub artifacts: ArtifactConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub model_dir: PathBuf,
    pub scaler_dir: PathBuf,
    pub dataset_dir: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("model"),
            scaler_dir: PathBuf::from("scaler"),
            dataset_dir: PathBuf::from("dataset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub logistic_regression: LogisticRegressionParams,
    pub support_vector_machine: SvmParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            logistic_regression: LogisticRegressionParams::default(),
            support_vector_machine: SvmParams::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("test_fraction must lie strictly between 0 and 1, got {0}")]
    InvalidTestFraction(f64),
}

impl Config {
    /// Reads `path`, or `medpredict.toml` if present, or falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    log::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.training.test_fraction;
        if fraction > 0.0 && fraction < 1.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidTestFraction(fraction))
        }
    }

    pub fn model_path(&self, file_name: &str) -> PathBuf {
        self.artifacts.model_dir.join(file_name)
    }

    pub fn scaler_path(&self, file_name: &str) -> PathBuf {
        self.artifacts.scaler_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support_vector_machine::KernelType;

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = Config::from_toml(
            r#"
[server]
port = 8080

[training.support_vector_machine]
regularization = 0.5
kernel = { type = "rbf", gamma = 0.1 }
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.training.support_vector_machine.regularization, 0.5);
        assert_eq!(
            config.training.support_vector_machine.kernel,
            KernelType::Rbf { gamma: 0.1 }
        );
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.artifacts.model_dir, PathBuf::from("model"));
    }

    #[test]
    fn rejects_degenerate_test_fraction() {
        let err = Config::from_toml("[training]\ntest_fraction = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTestFraction(_)));
    }

    #[test]
    fn reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[artifacts]\nmodel_dir = \"/srv/models\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.model_path("m.toml"), PathBuf::from("/srv/models/m.toml"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/medpredict.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
