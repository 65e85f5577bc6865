use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::domain::{DomainSpec, LabelEncoding};

/// Feature matrix and 0/1 labels of one domain, columns in schema order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
    pub feature_names: Vec<String>,
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("The required column '{0}' was not found in the dataset header")]
    ColumnNotFound(String),
    #[error("Value '{value}' in column '{column}' on row {row} is not a number")]
    NotNumeric {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Unexpected label '{value}' on row {row}")]
    UnknownLabel { row: usize, value: String },
    #[error("The dataset contains no rows")]
    Empty,
    #[error("The dataset contains only class {0}; both classes are required")]
    SingleClass(u8),
}

impl Dataset {
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.labels.iter().filter(|&&label| label > 0.5).count();
        [self.labels.len() - positives, positives]
    }
}

pub fn load_dataset(path: impl AsRef<Path>, spec: &DomainSpec) -> Result<Dataset, DatasetError> {
    let file = File::open(path.as_ref())?;
    read_dataset(BufReader::new(file), spec)
}

pub fn read_dataset<R: Read>(source: R, spec: &DomainSpec) -> Result<Dataset, DatasetError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();

    let kept: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !spec.dropped_columns.iter().any(|dropped| dropped == name))
        .collect();
    let dropped = headers.len() - kept.len();
    if dropped > 0 {
        log::debug!("Dropped {dropped} column(s) not used by the {} schema", spec.domain);
    }

    let position = |column: &str| {
        kept.iter()
            .find(|(_, name)| *name == column)
            .map(|(index, _)| *index)
            .ok_or_else(|| DatasetError::ColumnNotFound(column.to_string()))
    };

    let label_index = position(spec.label_column)?;
    let feature_indices = spec
        .feature_columns
        .iter()
        .map(|&column| position(column))
        .collect::<Result<Vec<_>, _>>()?;

    let mut values = Vec::new();
    let mut labels = Vec::new();

    for (offset, result) in reader.records().enumerate() {
        let record = result?;
        let row = offset + 1;

        let raw_label = record.get(label_index).unwrap_or_default();
        labels.push(encode_label(raw_label, spec.label_encoding, row)?);

        for (&index, column) in feature_indices.iter().zip(spec.feature_columns) {
            let raw = record.get(index).unwrap_or_default();
            let value = raw.parse::<f64>().map_err(|_| DatasetError::NotNumeric {
                row,
                column: (*column).to_string(),
                value: raw.to_string(),
            })?;
            values.push(value);
        }
    }

    if labels.is_empty() {
        return Err(DatasetError::Empty);
    }

    let features = Array2::from_shape_vec((labels.len(), feature_indices.len()), values)
        .map_err(|_| DatasetError::Empty)?;

    let dataset = Dataset {
        features,
        labels: Array1::from(labels),
        feature_names: spec.feature_columns.iter().map(ToString::to_string).collect(),
    };

    match dataset.class_counts() {
        [0, _] => Err(DatasetError::SingleClass(1)),
        [_, 0] => Err(DatasetError::SingleClass(0)),
        _ => Ok(dataset),
    }
}

fn encode_label(raw: &str, encoding: LabelEncoding, row: usize) -> Result<f64, DatasetError> {
    let unknown = || DatasetError::UnknownLabel {
        row,
        value: raw.to_string(),
    };

    match encoding {
        LabelEncoding::Categorical { positive, negative } => {
            if raw == positive {
                Ok(1.0)
            } else if raw == negative {
                Ok(0.0)
            } else {
                Err(unknown())
            }
        }
        LabelEncoding::Binary => match raw.parse::<f64>() {
            Ok(value) if value == 0.0 || value == 1.0 => Ok(value),
            _ => Err(unknown()),
        },
    }
}
