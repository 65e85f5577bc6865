use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::classifier::{sigmoid, validate_training_set, BinaryClassifier, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionParams {
    /// Inverse L2 regularization strength; the intercept is not penalized.
    pub inverse_regularization: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            inverse_regularization: 1.0,
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

/// L2-regularized logistic regression fitted by damped Newton iterations.
///
/// Minimizes `0.5 * |w|^2 + C * sum(log(1 + exp(z)) - y * z)` with
/// `z = w . x + intercept`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Array1<f64>,
    pub intercept: f64,
    pub params: LogisticRegressionParams,
}

impl LogisticRegression {
    pub fn new(dimensions: usize, params: LogisticRegressionParams) -> Self {
        Self {
            weights: Array1::zeros(dimensions),
            intercept: 0.0,
            params,
        }
    }

    const MAX_STEP_HALVINGS: usize = 30;

    /// Fits on 0/1 labels and returns the number of Newton iterations used.
    pub fn fit(
        &mut self,
        samples: ArrayView2<f64>,
        labels: ArrayView1<f64>,
    ) -> Result<usize, ModelError> {
        validate_training_set(samples, labels, self.weights.len())?;

        let dimensions = self.weights.len();
        // trailing column of ones carries the intercept
        let design = DMatrix::from_fn(samples.nrows(), dimensions + 1, |i, j| {
            if j < dimensions {
                samples[(i, j)]
            } else {
                1.0
            }
        });
        let targets = DVector::from_iterator(labels.len(), labels.iter().copied());

        let mut coefficients = DVector::zeros(dimensions + 1);
        let mut objective = self.objective(&design, &targets, &coefficients);
        let mut iterations = 0;

        while iterations < self.params.max_iterations {
            iterations += 1;

            let (gradient, hessian) = self.gradient_and_hessian(&design, &targets, &coefficients);
            let step = match hessian.clone().cholesky() {
                Some(cholesky) => cholesky.solve(&gradient),
                None => hessian
                    .lu()
                    .solve(&gradient)
                    .ok_or(ModelError::Singular(iterations))?,
            };

            // backtrack until the objective stops increasing
            let mut scale = 1.0;
            let mut candidate = &coefficients - &step;
            let mut candidate_objective = self.objective(&design, &targets, &candidate);
            for _ in 0..Self::MAX_STEP_HALVINGS {
                if candidate_objective <= objective {
                    break;
                }
                scale *= 0.5;
                candidate = &coefficients - scale * &step;
                candidate_objective = self.objective(&design, &targets, &candidate);
            }

            let change = (scale * &step).amax();
            coefficients = candidate;
            objective = candidate_objective;

            if change < self.params.tolerance {
                break;
            }
        }

        self.weights = Array1::from_iter(coefficients.iter().take(dimensions).copied());
        self.intercept = coefficients[dimensions];

        log::debug!(
            "Logistic regression stopped after {iterations} Newton iteration(s), objective {objective:.6}"
        );

        Ok(iterations)
    }

    fn objective(
        &self,
        design: &DMatrix<f64>,
        targets: &DVector<f64>,
        coefficients: &DVector<f64>,
    ) -> f64 {
        let dimensions = self.weights.len();
        let penalty = 0.5 * coefficients.rows(0, dimensions).norm_squared();

        let scores = design * coefficients;
        let log_loss: f64 = scores
            .iter()
            .zip(targets.iter())
            .map(|(&score, &target)| log_one_plus_exp(score) - target * score)
            .sum();

        penalty + self.params.inverse_regularization * log_loss
    }

    fn gradient_and_hessian(
        &self,
        design: &DMatrix<f64>,
        targets: &DVector<f64>,
        coefficients: &DVector<f64>,
    ) -> (DVector<f64>, DMatrix<f64>) {
        let dimensions = self.weights.len();
        let c = self.params.inverse_regularization;

        let probabilities = (design * coefficients).map(sigmoid);
        let residuals = &probabilities - targets;
        let curvature = probabilities.map(|p| p * (1.0 - p));

        let mut gradient = c * design.transpose() * residuals;
        let mut weighted = design.clone();
        for (mut row, &weight) in weighted.row_iter_mut().zip(curvature.iter()) {
            row *= weight;
        }
        let mut hessian = c * design.transpose() * weighted;

        for j in 0..dimensions {
            gradient[j] += coefficients[j];
            hessian[(j, j)] += 1.0;
        }
        // keeps the intercept row invertible on perfectly separated data
        hessian[(dimensions, dimensions)] += 1e-10;

        (gradient, hessian)
    }
}

fn log_one_plus_exp(value: f64) -> f64 {
    if value > 0.0 {
        value + (-value).exp().ln_1p()
    } else {
        value.exp().ln_1p()
    }
}

impl BinaryClassifier for LogisticRegression {
    fn dimensions(&self) -> usize {
        self.weights.len()
    }

    fn decision_function(&self, features: ArrayView1<f64>) -> f64 {
        features.dot(&self.weights) + self.intercept
    }

    fn predict_proba(&self, features: ArrayView1<f64>) -> [f64; 2] {
        let positive = sigmoid(self.decision_function(features));
        [1.0 - positive, positive]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn overlapping_blobs() -> (Array2<f64>, Array1<f64>) {
        let samples = array![
            [-2.0, -1.0],
            [-1.5, -0.5],
            [-1.0, -1.5],
            [-0.5, 0.5],
            [0.3, -0.2],
            [0.5, 0.4],
            [1.0, 1.5],
            [1.5, 0.5],
            [2.0, 1.0],
            [-0.2, 0.1],
        ];
        let labels = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (samples, labels)
    }

    #[test]
    fn separates_blobs() {
        let (samples, labels) = overlapping_blobs();
        let mut model = LogisticRegression::new(2, LogisticRegressionParams::default());
        model.fit(samples.view(), labels.view()).unwrap();

        assert_eq!(model.predict(array![-2.0, -2.0].view()), 0);
        assert_eq!(model.predict(array![2.0, 2.0].view()), 1);
        assert!(model.weights.iter().all(|&w| w > 0.0));
    }

    #[test]
    fn gradient_vanishes_at_solution() {
        let (samples, labels) = overlapping_blobs();
        let params = LogisticRegressionParams::default();
        let mut model = LogisticRegression::new(2, params);
        model.fit(samples.view(), labels.view()).unwrap();

        // dJ/dw = w + C * X^T (p - y) and dJ/db = C * sum(p - y)
        let mut gradient = model.weights.clone();
        let mut intercept_gradient = 0.0;
        for (row, &label) in samples.rows().into_iter().zip(labels.iter()) {
            let residual = model.predict_proba(row)[1] - label;
            gradient.scaled_add(params.inverse_regularization * residual, &row);
            intercept_gradient += params.inverse_regularization * residual;
        }

        for value in gradient {
            assert_abs_diff_eq!(value, 0.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(intercept_gradient, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn stronger_regularization_shrinks_weights() {
        let (samples, labels) = overlapping_blobs();

        let mut loose = LogisticRegression::new(2, LogisticRegressionParams::default());
        loose.fit(samples.view(), labels.view()).unwrap();

        let mut tight = LogisticRegression::new(
            2,
            LogisticRegressionParams {
                inverse_regularization: 0.01,
                ..LogisticRegressionParams::default()
            },
        );
        tight.fit(samples.view(), labels.view()).unwrap();

        assert!(tight.weights.dot(&tight.weights) < loose.weights.dot(&loose.weights));
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (samples, labels) = overlapping_blobs();
        let mut model = LogisticRegression::new(2, LogisticRegressionParams::default());
        model.fit(samples.view(), labels.view()).unwrap();

        for row in samples.rows() {
            let [negative, positive] = model.predict_proba(row);
            assert_abs_diff_eq!(negative + positive, 1.0, epsilon = 1e-12);
            assert_eq!(model.predict(row), usize::from(positive > 0.5));
        }
    }

    #[test]
    fn fits_perfectly_separable_data() {
        let samples = array![[-3.0], [-2.0], [-1.0], [1.0], [2.0], [3.0]];
        let labels = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = LogisticRegression::new(1, LogisticRegressionParams::default());
        model.fit(samples.view(), labels.view()).unwrap();

        assert!(model.weights[0].is_finite());
        assert_eq!(model.predict(array![-0.5].view()), 0);
        assert_eq!(model.predict(array![0.5].view()), 1);
    }
}
