use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-feature standardization `(x - mean) / scale`.
///
/// `scale` is the population standard deviation of the fitting data. Constant
/// features get a scale of 1 so they transform to 0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

#[derive(Error, Debug, PartialEq)]
pub enum ScalerError {
    #[error("Cannot fit a scaler on an empty matrix")]
    Empty,
    #[error("Expected {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

impl StandardScaler {
    pub fn fit(samples: ArrayView2<f64>) -> Result<Self, ScalerError> {
        if samples.nrows() == 0 || samples.ncols() == 0 {
            return Err(ScalerError::Empty);
        }

        let mean = samples.mean_axis(Axis(0)).ok_or(ScalerError::Empty)?;
        let scale = samples
            .std_axis(Axis(0), 0.0)
            .mapv(|std_dev| if std_dev > f64::EPSILON { std_dev } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn dimensions(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, samples: ArrayView2<f64>) -> Result<Array2<f64>, ScalerError> {
        self.check_dimensions(samples.ncols())?;
        Ok((&samples - &self.mean) / &self.scale)
    }

    pub fn transform_row(&self, sample: ArrayView1<f64>) -> Result<Array1<f64>, ScalerError> {
        self.check_dimensions(sample.len())?;
        Ok((&sample - &self.mean) / &self.scale)
    }

    fn check_dimensions(&self, found: usize) -> Result<(), ScalerError> {
        if found == self.dimensions() {
            Ok(())
        } else {
            Err(ScalerError::DimensionMismatch {
                expected: self.dimensions(),
                found,
            })
        }
    }
}
