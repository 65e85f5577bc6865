use std::collections::HashMap;

use ndarray::ArrayView1;
use thiserror::Error;

use crate::artifact::{load_pair, ArtifactError, ArtifactPaths};
use crate::classifier::{BinaryClassifier, Model};
use crate::config::Config;
use crate::domain::Domain;
use crate::pipeline::TrainedDomain;
use crate::scaler::{ScalerError, StandardScaler};

#[derive(Error, Debug, PartialEq)]
pub enum PredictError {
    #[error("Expected {expected} features for {domain}, got {found}")]
    WrongLength {
        domain: Domain,
        expected: usize,
        found: usize,
    },
    #[error("Feature at position {0} is not a finite number")]
    NonFinite(usize),
    #[error("{0}")]
    Scaler(#[from] ScalerError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class: usize,
    pub label: &'static str,
    pub message: String,
    /// Probability of class 0 and class 1.
    pub probabilities: [f64; 2],
}

/// Scaler and model of one domain, read-only once constructed.
#[derive(Debug, Clone)]
pub struct Predictor {
    domain: Domain,
    scaler: StandardScaler,
    model: Model,
}

impl Predictor {
    pub fn new(domain: Domain, scaler: StandardScaler, model: Model) -> Self {
        Self {
            domain,
            scaler,
            model,
        }
    }

    pub fn load(paths: &ArtifactPaths, domain: Domain) -> Result<Self, ArtifactError> {
        let (scaler, model) = load_pair(paths, domain)?;
        Ok(Self::new(domain, scaler, model))
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn predict(&self, features: &[f64]) -> Result<Prediction, PredictError> {
        let expected = self.domain.dimensions();
        if features.len() != expected {
            return Err(PredictError::WrongLength {
                domain: self.domain,
                expected,
                found: features.len(),
            });
        }
        if let Some(index) = features.iter().position(|value| !value.is_finite()) {
            return Err(PredictError::NonFinite(index));
        }

        let scaled = self.scaler.transform_row(ArrayView1::from(features))?;
        let class = self.model.predict(scaled.view());
        let probabilities = self.model.predict_proba(scaled.view());

        let spec = self.domain.spec();
        Ok(Prediction {
            class,
            label: spec.class_names[class],
            message: spec.message(class),
            probabilities,
        })
    }
}

impl From<TrainedDomain> for Predictor {
    fn from(trained: TrainedDomain) -> Self {
        Self::new(trained.domain, trained.scaler, trained.model)
    }
}

/// The predictors of every domain, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    predictors: HashMap<Domain, Predictor>,
}

impl Registry {
    /// Loads all three artifact pairs; any failure aborts.
    pub fn load(config: &Config) -> Result<Self, ArtifactError> {
        let mut registry = Self::default();
        for domain in Domain::ALL {
            let paths = ArtifactPaths::for_domain(config, domain);
            let predictor = Predictor::load(&paths, domain)?;
            log::info!(
                "Loaded {domain} predictor from {} and {}",
                paths.model.display(),
                paths.scaler.display()
            );
            registry.insert(predictor);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, predictor: Predictor) {
        self.predictors.insert(predictor.domain(), predictor);
    }

    pub fn get(&self, domain: Domain) -> Option<&Predictor> {
        self.predictors.get(&domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logistic_regression::{LogisticRegression, LogisticRegressionParams};
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    fn breast_cancer_predictor() -> Predictor {
        let dimensions = Domain::BreastCancer.dimensions();
        let mut model = LogisticRegression::new(dimensions, LogisticRegressionParams::default());
        model.weights = Array1::from_elem(dimensions, 1.0);
        let scaler = StandardScaler {
            mean: Array1::from_elem(dimensions, 10.0),
            scale: Array1::from_elem(dimensions, 2.0),
        };
        Predictor::new(Domain::BreastCancer, scaler, Model::LogisticRegression(model))
    }

    #[test]
    fn scales_before_predicting() {
        let predictor = breast_cancer_predictor();

        let high = predictor.predict(&[12.0; 10]).unwrap();
        assert_eq!(high.class, 1);
        assert_eq!(high.label, "Malignant");
        assert_eq!(high.message, "The Breast Cancer is Malignant");

        let low = predictor.predict(&[8.0; 10]).unwrap();
        assert_eq!(low.class, 0);
        assert_eq!(low.message, "The Breast Cancer is Benign");

        // exactly at the mean the decision score is zero
        let middle = predictor.predict(&[10.0; 10]).unwrap();
        assert_abs_diff_eq!(middle.probabilities[1], 0.5);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let predictor = breast_cancer_predictor();
        for value in [-100.0, 0.0, 9.5, 10.5, 1e4] {
            let prediction = predictor.predict(&[value; 10]).unwrap();
            let [negative, positive] = prediction.probabilities;
            assert_abs_diff_eq!(negative + positive, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_wrong_length_and_non_finite_values() {
        let predictor = breast_cancer_predictor();
        assert_eq!(
            predictor.predict(&[1.0; 9]),
            Err(PredictError::WrongLength {
                domain: Domain::BreastCancer,
                expected: 10,
                found: 9
            })
        );

        let mut features = [1.0; 10];
        features[3] = f64::NAN;
        assert_eq!(predictor.predict(&features), Err(PredictError::NonFinite(3)));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let predictor = breast_cancer_predictor();
        let features = [11.0, 9.0, 10.5, 12.0, 7.5, 10.0, 10.1, 9.9, 13.0, 8.0];
        let first = predictor.predict(&features).unwrap();
        for _ in 0..5 {
            assert_eq!(predictor.predict(&features).unwrap(), first);
        }
    }
}
