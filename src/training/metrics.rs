//! Regression metrics and evaluation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error sums accumulated over predictions
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Number of predictions
    pub count: usize,
    /// Sum of squared errors
    pub sq_err_sum: f64,
    /// Sum of absolute errors
    pub abs_err_sum: f64,
    /// Sum of targets
    pub target_sum: f64,
    /// Sum of squared targets
    pub target_sq_sum: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate metrics over paired predictions and targets
    pub fn from_predictions(predictions: &[f64], targets: &[f64]) -> Self {
        let mut metrics = Self::new();
        for (p, t) in predictions.iter().zip(targets) {
            metrics.update(*p, *t);
        }
        metrics
    }

    /// Record one prediction
    pub fn update(&mut self, prediction: f64, target: f64) {
        let err = prediction - target;
        self.count += 1;
        self.sq_err_sum += err * err;
        self.abs_err_sum += err.abs();
        self.target_sum += target;
        self.target_sq_sum += target * target;
    }

    /// Root mean squared error
    pub fn rmse(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.sq_err_sum / self.count as f64).sqrt()
        }
    }

    /// Mean absolute error
    pub fn mae(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.abs_err_sum / self.count as f64
        }
    }

    /// Coefficient of determination. A constant target gives 1.0 when it is
    /// predicted exactly and 0.0 otherwise.
    pub fn r2(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.target_sum / n;
        let total = (self.target_sq_sum - n * mean * mean).max(0.0);
        if total <= f64::EPSILON * self.target_sq_sum.max(1.0) {
            return if self.sq_err_sum == 0.0 { 1.0 } else { 0.0 };
        }
        1.0 - self.sq_err_sum / total
    }

    pub fn summary(&self) -> RegressionMetrics {
        RegressionMetrics {
            samples: self.count,
            rmse: self.rmse(),
            mae: self.mae(),
            r2: self.r2(),
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Final metrics for one evaluation set, stored with the model artifact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub samples: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMSE: {:.1} | MAE: {:.1} | R²: {:.4} | n={}",
            self.rmse, self.mae, self.r2, self.samples
        )
    }
}
