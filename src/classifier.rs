//! Shared seam of the two model families.
//!
//! Both classifiers map a scaled feature vector to a real-valued decision
//! score; class 1 is predicted for positive scores and the probability
//! distribution is derived from the same score, so `predict` and
//! `predict_proba` never need the training data.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logistic_regression::LogisticRegression;
use crate::support_vector_machine::SupportVectorMachine;

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("Cannot fit a model on an empty training set")]
    EmptyTrainingSet,
    #[error("Training labels contain a single class; both 0 and 1 are required")]
    SingleClass,
    #[error("Training matrix has {samples} rows but {labels} labels were given")]
    LabelCountMismatch { samples: usize, labels: usize },
    #[error("Model expects {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Newton system is singular at iteration {0}")]
    Singular(usize),
}

pub trait BinaryClassifier {
    fn dimensions(&self) -> usize;

    fn decision_function(&self, features: ArrayView1<f64>) -> f64;

    /// Probability of class 0 and class 1, in that order.
    fn predict_proba(&self, features: ArrayView1<f64>) -> [f64; 2];

    fn predict(&self, features: ArrayView1<f64>) -> usize {
        usize::from(self.decision_function(features) > 0.0)
    }
}

/// A fitted model of either family, as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    LogisticRegression(LogisticRegression),
    SupportVectorMachine(SupportVectorMachine),
}

impl Model {
    fn inner(&self) -> &dyn BinaryClassifier {
        match self {
            Model::LogisticRegression(model) => model,
            Model::SupportVectorMachine(model) => model,
        }
    }
}

impl BinaryClassifier for Model {
    fn dimensions(&self) -> usize {
        self.inner().dimensions()
    }

    fn decision_function(&self, features: ArrayView1<f64>) -> f64 {
        self.inner().decision_function(features)
    }

    fn predict_proba(&self, features: ArrayView1<f64>) -> [f64; 2] {
        self.inner().predict_proba(features)
    }

    fn predict(&self, features: ArrayView1<f64>) -> usize {
        self.inner().predict(features)
    }
}

pub fn sigmoid(value: f64) -> f64 {
    let clamped = value.clamp(-700.0, 700.0);
    1.0 / (1.0 + (-clamped).exp())
}

/// Checks shared by both `fit` implementations.
pub(crate) fn validate_training_set(
    samples: ArrayView2<f64>,
    labels: ArrayView1<f64>,
    dimensions: usize,
) -> Result<(), ModelError> {
    if samples.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if samples.nrows() != labels.len() {
        return Err(ModelError::LabelCountMismatch {
            samples: samples.nrows(),
            labels: labels.len(),
        });
    }
    if samples.ncols() != dimensions {
        return Err(ModelError::DimensionMismatch {
            expected: dimensions,
            found: samples.ncols(),
        });
    }
    let positives = labels.iter().filter(|&&label| label > 0.5).count();
    if positives == 0 || positives == labels.len() {
        return Err(ModelError::SingleClass);
    }
    Ok(())
}

pub fn accuracy<C: BinaryClassifier + ?Sized>(
    model: &C,
    samples: ArrayView2<f64>,
    labels: ArrayView1<f64>,
) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }

    let correct = samples
        .rows()
        .into_iter()
        .zip(labels.iter())
        .filter(|(row, &label)| model.predict(*row) == usize::from(label > 0.5))
        .count();

    correct as f64 / labels.len() as f64
}
