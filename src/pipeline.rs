use std::path::Path;

use ndarray::{ArrayView1, ArrayView2};
use thiserror::Error;

use crate::artifact::{save_pair, ArtifactError, ArtifactPaths};
use crate::classifier::{accuracy, BinaryClassifier, Model, ModelError};
use crate::config::{Config, TrainingConfig};
use crate::domain::{ClassifierKind, Domain};
use crate::logistic_regression::LogisticRegression;
use crate::parse::{load_dataset, Dataset, DatasetError};
use crate::scaler::{ScalerError, StandardScaler};
use crate::split::stratified_split;
use crate::support_vector_machine::SupportVectorMachine;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to load dataset: {0}")]
    Dataset(#[from] DatasetError),
    #[error("Failed to standardize features: {0}")]
    Scaler(#[from] ScalerError),
    #[error("Failed to fit model: {0}")]
    Model(#[from] ModelError),
    #[error("Failed to persist artifacts: {0}")]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub train_samples: usize,
    pub test_samples: usize,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    /// Newton iterations or SMO passes, depending on the classifier.
    pub iterations: usize,
}

/// Scaler and model fitted in the same run, ready to persist or serve.
#[derive(Debug, Clone)]
pub struct TrainedDomain {
    pub domain: Domain,
    pub scaler: StandardScaler,
    pub model: Model,
    pub report: TrainingReport,
}

pub fn train_domain(
    domain: Domain,
    dataset_path: &Path,
    config: &TrainingConfig,
) -> Result<TrainedDomain, PipelineError> {
    log::info!("Loading {domain} dataset from {}", dataset_path.display());
    let dataset = load_dataset(dataset_path, domain.spec())?;
    let [negatives, positives] = dataset.class_counts();
    log::info!(
        "Loaded {} samples with {} features ({negatives} class 0, {positives} class 1)",
        dataset.n_samples(),
        dataset.n_features()
    );

    fit_dataset(domain, &dataset, config)
}

/// Split, standardize on the training half, fit, and score both halves.
pub fn fit_dataset(
    domain: Domain,
    dataset: &Dataset,
    config: &TrainingConfig,
) -> Result<TrainedDomain, PipelineError> {
    let spec = domain.spec();
    let split = stratified_split(dataset.labels.view(), config.test_fraction, spec.seed);
    let (train_x, train_y, test_x, test_y) = split.apply(dataset);

    let scaler = StandardScaler::fit(train_x.view())?;
    let train_x = scaler.transform(train_x.view())?;
    let test_x = scaler.transform(test_x.view())?;

    let (model, iterations) =
        fit_model(spec.classifier, train_x.view(), train_y.view(), config)?;

    let report = TrainingReport {
        train_samples: train_y.len(),
        test_samples: test_y.len(),
        train_accuracy: accuracy(&model, train_x.view(), train_y.view()),
        test_accuracy: accuracy(&model, test_x.view(), test_y.view()),
        iterations,
    };

    log::info!(
        "{domain}: train accuracy {:.3}% on {} samples, test accuracy {:.3}% on {} samples",
        report.train_accuracy * 100.0,
        report.train_samples,
        report.test_accuracy * 100.0,
        report.test_samples
    );

    Ok(TrainedDomain {
        domain,
        scaler,
        model,
        report,
    })
}

fn fit_model(
    kind: ClassifierKind,
    samples: ArrayView2<f64>,
    labels: ArrayView1<f64>,
    config: &TrainingConfig,
) -> Result<(Model, usize), ModelError> {
    match kind {
        ClassifierKind::LogisticRegression => {
            let mut model = LogisticRegression::new(samples.ncols(), config.logistic_regression);
            let iterations = model.fit(samples, labels)?;
            Ok((Model::LogisticRegression(model), iterations))
        }
        ClassifierKind::SupportVectorMachine => {
            let mut model =
                SupportVectorMachine::new(samples.ncols(), config.support_vector_machine);
            let iterations = model.fit(samples, labels)?;
            Ok((Model::SupportVectorMachine(model), iterations))
        }
    }
}

impl TrainedDomain {
    pub fn save(&self, paths: &ArtifactPaths) -> Result<(), ArtifactError> {
        save_pair(paths, self.domain, &self.scaler, &self.model)
    }

    pub fn dimensions(&self) -> usize {
        self.model.dimensions()
    }
}

/// Trains `domain` from `<dataset_dir>/<domain>_data.csv` and writes its artifacts.
pub fn train_and_save(
    domain: Domain,
    dataset_dir: &Path,
    config: &Config,
) -> Result<TrainingReport, PipelineError> {
    let dataset_path = dataset_dir.join(domain.dataset_file_name());
    let trained = train_domain(domain, &dataset_path, &config.training)?;
    trained.save(&ArtifactPaths::for_domain(config, domain))?;
    Ok(trained.report)
}
