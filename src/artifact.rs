//! On-disk model and scaler files.
//!
//! Each domain persists two independent TOML documents, one for the fitted
//! classifier and one for the fitted scaler. Both record the domain and the
//! feature names they were fitted on, which `load_pair` checks against each
//! other and against the domain schema before anything is served.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{BinaryClassifier, Model};
use crate::config::Config;
use crate::domain::Domain;
use crate::scaler::StandardScaler;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub domain: Domain,
    pub feature_names: Vec<String>,
    pub model: Model,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub domain: Domain,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to access artifact file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse artifact file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize artifact to TOML format: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Artifact '{path}' belongs to domain '{found}', expected '{expected}'")]
    WrongDomain {
        path: PathBuf,
        expected: Domain,
        found: Domain,
    },
    #[error("Artifact '{path}' was fitted on features {found:?}, but the {domain} schema is {expected:?}")]
    SchemaMismatch {
        path: PathBuf,
        domain: Domain,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Artifact '{path}' holds {found} parameters per sample, expected {expected}")]
    DimensionMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

/// Where the two files of one domain live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
}

impl ArtifactPaths {
    pub fn for_domain(config: &Config, domain: Domain) -> Self {
        Self {
            model: config.model_path(&domain.model_file_name()),
            scaler: config.scaler_path(&domain.scaler_file_name()),
        }
    }
}

fn write_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ArtifactError> {
    let io_error = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };

    let toml_string = toml::to_string_pretty(value)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut file = BufWriter::new(fs::File::create(path).map_err(io_error)?);
    file.write_all(toml_string.as_bytes()).map_err(io_error)?;
    file.flush().map_err(io_error)?;
    Ok(())
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let toml_string = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&toml_string).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        write_toml(self, path)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        read_toml(path)
    }
}

impl ScalerArtifact {
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        write_toml(self, path)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        read_toml(path)
    }
}

fn check_schema(
    path: &Path,
    domain: Domain,
    found_domain: Domain,
    feature_names: &[String],
) -> Result<(), ArtifactError> {
    if found_domain != domain {
        return Err(ArtifactError::WrongDomain {
            path: path.to_path_buf(),
            expected: domain,
            found: found_domain,
        });
    }

    let expected = domain.spec().feature_columns;
    if feature_names.iter().map(String::as_str).ne(expected.iter().copied()) {
        return Err(ArtifactError::SchemaMismatch {
            path: path.to_path_buf(),
            domain,
            expected: expected.iter().map(ToString::to_string).collect(),
            found: feature_names.to_vec(),
        });
    }
    Ok(())
}

fn check_dimensions(path: &Path, expected: usize, found: usize) -> Result<(), ArtifactError> {
    if expected == found {
        Ok(())
    } else {
        Err(ArtifactError::DimensionMismatch {
            path: path.to_path_buf(),
            expected,
            found,
        })
    }
}

pub fn save_pair(
    paths: &ArtifactPaths,
    domain: Domain,
    scaler: &StandardScaler,
    model: &Model,
) -> Result<(), ArtifactError> {
    let feature_names: Vec<String> = domain
        .spec()
        .feature_columns
        .iter()
        .map(ToString::to_string)
        .collect();

    ModelArtifact {
        domain,
        feature_names: feature_names.clone(),
        model: model.clone(),
    }
    .save(&paths.model)?;

    ScalerArtifact {
        domain,
        feature_names,
        scaler: scaler.clone(),
    }
    .save(&paths.scaler)?;

    log::info!(
        "Saved {domain} model to {} and scaler to {}",
        paths.model.display(),
        paths.scaler.display()
    );
    Ok(())
}

/// Loads and cross-checks the scaler and model of `domain`.
pub fn load_pair(
    paths: &ArtifactPaths,
    domain: Domain,
) -> Result<(StandardScaler, Model), ArtifactError> {
    let model_artifact = ModelArtifact::load(&paths.model)?;
    check_schema(
        &paths.model,
        domain,
        model_artifact.domain,
        &model_artifact.feature_names,
    )?;
    check_dimensions(
        &paths.model,
        domain.dimensions(),
        model_artifact.model.dimensions(),
    )?;

    let scaler_artifact = ScalerArtifact::load(&paths.scaler)?;
    check_schema(
        &paths.scaler,
        domain,
        scaler_artifact.domain,
        &scaler_artifact.feature_names,
    )?;
    check_dimensions(
        &paths.scaler,
        domain.dimensions(),
        scaler_artifact.scaler.dimensions(),
    )?;
    check_dimensions(
        &paths.scaler,
        domain.dimensions(),
        scaler_artifact.scaler.scale.len(),
    )?;

    Ok((scaler_artifact.scaler, model_artifact.model))
}
