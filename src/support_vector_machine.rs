use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::classifier::{validate_training_set, BinaryClassifier, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelType {
    Linear,
    Polynomial { degree: u32 },
    Rbf { gamma: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    pub kernel: KernelType,
    pub regularization: f64,
    pub tolerance: f64,
    /// Consecutive passes without an alpha update before SMO stops.
    pub max_iterations: usize,
    /// Hard cap on SMO passes.
    pub max_passes: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            kernel: KernelType::Linear,
            regularization: 1.0,
            tolerance: 1e-3,
            max_iterations: 10,
            max_passes: 1000,
        }
    }
}

/// Sigmoid fitted on decision values, `P(y = 1 | f) = 1 / (1 + exp(a * f + b))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self { a: -1.0, b: 0.0 }
    }
}

/// Soft-margin SVM trained with SMO, with Platt-scaled probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportVectorMachine {
    pub params: SvmParams,
    pub dimensions: usize,
    pub bias: f64,
    /// Primal weights, only kept for the linear kernel.
    pub weights: Option<Array1<f64>>,
    pub support_vectors: Array2<f64>,
    /// `alpha_i * y_i` for each support vector.
    pub dual_coefficients: Array1<f64>,
    pub platt: PlattScaling,
}

impl SupportVectorMachine {
    pub fn new(dimensions: usize, params: SvmParams) -> Self {
        Self {
            params,
            dimensions,
            bias: 0.0,
            weights: None,
            support_vectors: Array2::zeros((0, dimensions)),
            dual_coefficients: Array1::zeros(0),
            platt: PlattScaling::default(),
        }
    }

    const ALPHA_EPSILON: f64 = 1e-8;

    fn kernel_function(
        &self,
        first_sample: ArrayView1<f64>,
        second_sample: ArrayView1<f64>,
    ) -> f64 {
        kernel(self.params.kernel, first_sample, second_sample)
    }

    /// Fits on 0/1 labels and returns the number of SMO passes used.
    #[allow(clippy::similar_names)]
    pub fn fit(
        &mut self,
        samples: ArrayView2<f64>,
        labels: ArrayView1<f64>,
    ) -> Result<usize, ModelError> {
        validate_training_set(samples, labels, self.dimensions)?;

        let n = samples.nrows();
        let signs = labels.mapv(|label| if label > 0.5 { 1.0 } else { -1.0 });
        let gram = Array2::from_shape_fn((n, n), |(i, j)| {
            self.kernel_function(samples.row(i), samples.row(j))
        });

        let regularization = self.params.regularization;
        let tolerance = self.params.tolerance;

        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        // f(x_i) - y_i, kept in sync with alphas and bias
        let mut errors = -&signs;

        let mut quiet_passes = 0;
        let mut passes = 0;

        while quiet_passes < self.params.max_iterations && passes < self.params.max_passes {
            passes += 1;
            let mut alpha_pairs_changed = 0;

            for i in 0..n {
                let error_i = errors[i];
                let violates = (signs[i] * error_i < -tolerance && alphas[i] < regularization)
                    || (signs[i] * error_i > tolerance && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                // second choice: largest step, falling back to the next sample
                let best = (0..n)
                    .filter(|&k| k != i)
                    .max_by(|&a, &b| {
                        (error_i - errors[a])
                            .abs()
                            .total_cmp(&(error_i - errors[b]).abs())
                    })
                    .unwrap_or((i + 1) % n);

                let mut updated = false;
                for j in [best, (i + 1) % n] {
                    if j == i {
                        continue;
                    }
                    if let Some(delta_bias) = take_step(
                        i,
                        j,
                        &gram,
                        &signs,
                        &mut alphas,
                        &mut errors,
                        bias,
                        regularization,
                    ) {
                        bias += delta_bias;
                        updated = true;
                        break;
                    }
                }

                if updated {
                    alpha_pairs_changed += 1;
                }
            }

            if alpha_pairs_changed == 0 {
                quiet_passes += 1;
            } else {
                quiet_passes = 0;
            }
        }

        let support_indices: Vec<usize> = (0..n)
            .filter(|&i| alphas[i] > Self::ALPHA_EPSILON)
            .collect();

        self.support_vectors = samples.select(Axis(0), &support_indices);
        self.dual_coefficients = support_indices
            .iter()
            .map(|&i| alphas[i] * signs[i])
            .collect();
        self.bias = bias;

        self.weights = match self.params.kernel {
            KernelType::Linear => Some(self.dual_coefficients.dot(&self.support_vectors)),
            _ => None,
        };

        let decisions: Array1<f64> = samples
            .rows()
            .into_iter()
            .map(|row| self.decision_function(row))
            .collect();
        self.platt = fit_platt(decisions.view(), labels);

        log::debug!(
            "SMO finished after {passes} pass(es) with {} support vector(s); Platt a={:.4}, b={:.4}",
            support_indices.len(),
            self.platt.a,
            self.platt.b
        );

        Ok(passes)
    }
}

fn kernel(
    kernel_type: KernelType,
    first_sample: ArrayView1<f64>,
    second_sample: ArrayView1<f64>,
) -> f64 {
    match kernel_type {
        KernelType::Linear => first_sample.dot(&second_sample),
        KernelType::Polynomial { degree } => first_sample
            .dot(&second_sample)
            .powi(i32::try_from(degree).unwrap_or(i32::MAX)),
        KernelType::Rbf { gamma } => {
            let distance: f64 = first_sample
                .iter()
                .zip(second_sample.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            (-gamma * distance).exp()
        }
    }
}

/// Joint update of `alphas[i]` and `alphas[j]`. Returns the bias change, or
/// `None` when the pair cannot make progress.
#[allow(clippy::too_many_arguments)]
#[allow(clippy::similar_names)]
fn take_step(
    i: usize,
    j: usize,
    gram: &Array2<f64>,
    signs: &Array1<f64>,
    alphas: &mut Array1<f64>,
    errors: &mut Array1<f64>,
    bias: f64,
    regularization: f64,
) -> Option<f64> {
    let error_i = errors[i];
    let error_j = errors[j];
    let prev_alpha_i = alphas[i];
    let prev_alpha_j = alphas[j];

    let (l, h) = if (signs[i] - signs[j]).abs() > f64::EPSILON {
        (
            f64::max(0.0, prev_alpha_j - prev_alpha_i),
            f64::min(regularization, regularization + prev_alpha_j - prev_alpha_i),
        )
    } else {
        (
            f64::max(0.0, prev_alpha_i + prev_alpha_j - regularization),
            f64::min(regularization, prev_alpha_i + prev_alpha_j),
        )
    };

    if l >= h {
        return None;
    }

    let eta = 2.0 * gram[(i, j)] - gram[(i, i)] - gram[(j, j)];
    if eta >= 0.0 {
        return None;
    }

    let alpha_j = (prev_alpha_j - signs[j] * (error_i - error_j) / eta).clamp(l, h);
    if (alpha_j - prev_alpha_j).abs() < 1e-5 {
        return None;
    }
    let alpha_i = prev_alpha_i + signs[i] * signs[j] * (prev_alpha_j - alpha_j);

    let delta_i = signs[i] * (alpha_i - prev_alpha_i);
    let delta_j = signs[j] * (alpha_j - prev_alpha_j);

    let first_bias_candidate = bias - error_i - delta_i * gram[(i, i)] - delta_j * gram[(i, j)];
    let second_bias_candidate = bias - error_j - delta_i * gram[(i, j)] - delta_j * gram[(j, j)];

    let new_bias = if 0.0 < alpha_i && alpha_i < regularization {
        first_bias_candidate
    } else if 0.0 < alpha_j && alpha_j < regularization {
        second_bias_candidate
    } else {
        (first_bias_candidate + second_bias_candidate) / 2.0
    };
    let delta_bias = new_bias - bias;

    alphas[i] = alpha_i;
    alphas[j] = alpha_j;

    for (k, error) in errors.iter_mut().enumerate() {
        *error += delta_i * gram[(i, k)] + delta_j * gram[(j, k)] + delta_bias;
    }

    Some(delta_bias)
}

/// Platt's sigmoid fit with the regularized targets and Newton/backtracking
/// scheme of Lin, Lin and Weng.
fn fit_platt(decisions: ArrayView1<f64>, labels: ArrayView1<f64>) -> PlattScaling {
    const MAX_ITERATIONS: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPSILON: f64 = 1e-5;

    let positives = labels.iter().filter(|&&label| label > 0.5).count() as f64;
    let negatives = labels.len() as f64 - positives;

    let high_target = (positives + 1.0) / (positives + 2.0);
    let low_target = 1.0 / (negatives + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&label| if label > 0.5 { high_target } else { low_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        decisions
            .iter()
            .zip(&targets)
            .map(|(&f, &t)| {
                let f_apb = f * a + b;
                if f_apb >= 0.0 {
                    t * f_apb + (-f_apb).exp().ln_1p()
                } else {
                    (t - 1.0) * f_apb + f_apb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((negatives + 1.0) / (positives + 1.0)).ln();
    let mut value = objective(a, b);

    for _ in 0..MAX_ITERATIONS {
        let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);

        for (&f, &t) in decisions.iter().zip(&targets) {
            let f_apb = f * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < EPSILON && g2.abs() < EPSILON {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let delta_a = -(h22 * g1 - h21 * g2) / det;
        let delta_b = -(-h21 * g1 + h11 * g2) / det;
        let directional = g1 * delta_a + g2 * delta_b;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * delta_a;
            let new_b = b + step * delta_b;
            let new_value = objective(new_a, new_b);
            if new_value < value + 1e-4 * step * directional {
                a = new_a;
                b = new_b;
                value = new_value;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            log::warn!("Platt scaling line search failed; keeping a={a:.4}, b={b:.4}");
            break;
        }
    }

    PlattScaling { a, b }
}

impl BinaryClassifier for SupportVectorMachine {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn decision_function(&self, features: ArrayView1<f64>) -> f64 {
        if let Some(weights) = &self.weights {
            return weights.dot(&features) + self.bias;
        }

        self.support_vectors
            .rows()
            .into_iter()
            .zip(self.dual_coefficients.iter())
            .map(|(vector, &coefficient)| coefficient * self.kernel_function(vector, features))
            .sum::<f64>()
            + self.bias
    }

    fn predict_proba(&self, features: ArrayView1<f64>) -> [f64; 2] {
        let f_apb = self.decision_function(features) * self.platt.a + self.platt.b;
        // numerically stable form of 1 / (1 + exp(f_apb))
        let positive = if f_apb >= 0.0 {
            let e = (-f_apb).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f_apb.exp())
        };
        [1.0 - positive, positive]
    }
}
