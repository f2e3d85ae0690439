//! Fit quality metrics

use super::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coefficient of determination of `predicted` against `actual`.
///
/// Constant targets have no variance to explain: a perfect prediction scores
/// 1.0 and anything else scores 0.0.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(ModelError::DimensionMismatch {
            expected: format!("{} predictions", actual.len()),
            found: format!("{} predictions", predicted.len()),
        });
    }
    if actual.is_empty() {
        return Err(ModelError::DimensionMismatch {
            expected: "at least one sample".to_string(),
            found: "0 samples".to_string(),
        });
    }
    Ok(())
}

/// Summary of prediction error on a held-out set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FitMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub r2: f64,   // R-squared
    pub samples: usize,
}

impl FitMetrics {
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        let r2 = r2_score(actual, predicted)?;
        let n = actual.len() as f64;

        let mae = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).abs())
            .sum::<f64>()
            / n;

        let mse = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .sum::<f64>()
            / n;

        Ok(Self {
            mae,
            rmse: mse.sqrt(),
            r2,
            samples: actual.len(),
        })
    }
}

impl fmt::Display for FitMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R²={:.4}, MAE={:.3}, RMSE={:.3}, n={}",
            self.r2, self.mae, self.rmse, self.samples
        )
    }
}
