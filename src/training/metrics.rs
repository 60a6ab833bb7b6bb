//! Evaluation metrics and the training report

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error metrics for a regression model on held-out data
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean absolute error
    pub mae: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// Number of evaluated samples
    pub samples: usize,
}

impl RegressionMetrics {
    /// Compare predictions against targets pairwise
    pub fn compute(predictions: &[f64], targets: &[f64]) -> Self {
        let samples = predictions.len().min(targets.len());
        if samples == 0 {
            return Self::default();
        }

        let (abs_sum, sq_sum) = predictions
            .iter()
            .zip(targets)
            .fold((0.0, 0.0), |(abs, sq), (p, t)| {
                let err = p - t;
                (abs + err.abs(), sq + err * err)
            });

        RegressionMetrics {
            mae: abs_sum / samples as f64,
            rmse: (sq_sum / samples as f64).sqrt(),
            samples,
        }
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE: {:.3}, RMSE: {:.3} ({} samples)",
            self.mae, self.rmse, self.samples
        )
    }
}

/// Summary of one training run, persisted with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Position head on the held-out split
    pub position: RegressionMetrics,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Vocabulary sizes
    pub drivers: usize,
    pub teams: usize,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Position model: {}", self.position)?;
        writeln!(
            f,
            "Samples: {} train / {} test",
            self.train_samples, self.test_samples
        )?;
        write!(f, "Vocabulary: {} drivers, {} teams", self.drivers, self.teams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_regression_metrics() {
        let m = RegressionMetrics::compute(&[1.0, 4.0, 10.0], &[2.0, 4.0, 7.0]);
        assert_eq!(m.samples, 3);
        assert_relative_eq!(m.mae, 4.0 / 3.0);
        assert_relative_eq!(m.rmse, (10.0f64 / 3.0).sqrt());
    }

    #[test]
    fn test_empty_metrics() {
        let m = RegressionMetrics::compute(&[], &[]);
        assert_eq!(m, RegressionMetrics::default());
    }

    #[test]
    fn test_display() {
        let m = RegressionMetrics {
            mae: 2.5,
            rmse: 3.25,
            samples: 8,
        };
        assert_eq!(m.to_string(), "MAE: 2.500, RMSE: 3.250 (8 samples)");
    }
}
