//! Fitted polynomial regression model

use super::features::{self, DEGREE, N_TERMS, TERM_NAMES};
use super::{ModelError, Result};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Learned coefficients of a degree-2 polynomial regression for one model.
///
/// Coefficients follow the basis order of [`features::TERM_NAMES`], the first
/// one being the intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialModel {
    model: String,
    coefficients: DVector<f64>,
}

impl PolynomialModel {
    pub fn new(model: impl Into<String>, coefficients: Vec<f64>) -> Result<Self> {
        if coefficients.len() != N_TERMS {
            return Err(ModelError::DimensionMismatch {
                expected: format!("{} coefficients", N_TERMS),
                found: format!("{} coefficients", coefficients.len()),
            });
        }
        Ok(Self {
            model: model.into(),
            coefficients: DVector::from_vec(coefficients),
        })
    }

    /// Fit ordinary least squares of `targets` on the expanded `inputs`
    pub fn fit(model: impl Into<String>, inputs: &DMatrix<f64>, targets: &DVector<f64>) -> Result<Self> {
        let model = model.into();
        if inputs.nrows() != targets.len() {
            return Err(ModelError::DimensionMismatch {
                expected: format!("{} targets", inputs.nrows()),
                found: format!("{} targets", targets.len()),
            });
        }
        if inputs.nrows() == 0 {
            return Err(ModelError::Solve {
                model,
                reason: "no training rows".to_string(),
            });
        }

        let design = features::expand(inputs)?;
        let coefficients = solve_centred(&design, targets).ok_or_else(|| ModelError::Solve {
            model: model.clone(),
            reason: "design matrix is not solvable".to_string(),
        })?;

        Ok(Self {
            model,
            coefficients,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn degree(&self) -> u32 {
        DEGREE
    }

    pub fn coefficients(&self) -> &[f64] {
        self.coefficients.as_slice()
    }

    /// Predicted power for one operating point
    pub fn predict_one(&self, condenser_temp_c: f64, evaporator_temp_c: f64) -> f64 {
        features::expand_row(condenser_temp_c, evaporator_temp_c)
            .iter()
            .zip(self.coefficients.iter())
            .map(|(f, c)| f * c)
            .sum()
    }

    /// Predicted power for every row of an `n × 2` input matrix
    pub fn predict(&self, inputs: &DMatrix<f64>) -> Result<DVector<f64>> {
        let design = features::expand(inputs)?;
        Ok(design * &self.coefficients)
    }
}

impl fmt::Display for PolynomialModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: power =", self.model)?;
        for (i, (name, c)) in TERM_NAMES.iter().zip(self.coefficients.iter()).enumerate() {
            let sep = if i == 0 { " " } else { " + " };
            if *name == "1" {
                write!(f, "{}{:.6}", sep, c)?;
            } else {
                write!(f, "{}{:.6}·{}", sep, c, name)?;
            }
        }
        Ok(())
    }
}

/// Least squares with an unpenalised intercept.
///
/// The non-constant columns of `design` and the targets are centred on their
/// means before solving, and the intercept is recovered as
/// `ȳ − Σ x̄ⱼ·βⱼ`. With fewer rows than terms the minimum-norm solution
/// therefore only constrains the slope terms, and the fitted surface always
/// passes through the mean training point.
fn solve_centred(design: &DMatrix<f64>, targets: &DVector<f64>) -> Option<DVector<f64>> {
    let mut centred = design.columns(1, N_TERMS - 1).into_owned();
    let means: Vec<f64> = centred.column_iter().map(|col| col.mean()).collect();
    for (mut col, mean) in centred.column_iter_mut().zip(&means) {
        col.add_scalar_mut(-mean);
    }
    let y_mean = targets.mean();
    let slopes = solve_least_squares(&centred, &targets.add_scalar(-y_mean))?;

    let intercept = y_mean - slopes.iter().zip(&means).map(|(b, m)| b * m).sum::<f64>();
    let mut coefficients = DVector::zeros(N_TERMS);
    coefficients[0] = intercept;
    coefficients.rows_mut(1, N_TERMS - 1).copy_from(&slopes);
    coefficients[0].is_finite().then_some(coefficients)
}

/// Solve a least squares problem using SVD.
///
/// Singular values below `max(n, m) · ε · σ_max` are treated as zero, so
/// rank-deficient and under-determined systems get the minimum-norm solution.
/// Returns `None` if the solution is not finite.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    let tol = sigma_max * x.nrows().max(x.ncols()) as f64 * f64::EPSILON;

    let beta = svd.solve(y, tol).ok()?;
    beta.iter().all(|v| v.is_finite()).then_some(beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_least_squares_recovers_basis_coefficients() {
        let coefficients = DVector::from_row_slice(&[120.0, 4.5, -2.0, 0.03, 0.12, -0.01]);
        let inputs = DMatrix::from_row_slice(
            8,
            2,
            &[
                30.0, -10.0, 35.0, -5.0, 40.0, 0.0, 45.0, -8.0, 50.0, 2.0, 33.0, -12.0, 42.0, -3.0, 28.0,
                -20.0,
            ],
        );
        let design = features::expand(&inputs).unwrap();
        let power = &design * &coefficients;

        let beta = solve_least_squares(&design, &power).unwrap();
        for (got, want) in beta.iter().zip(coefficients.iter()) {
            assert!((got - want).abs() < 1e-6, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_fit_recovers_quadratic_surface() {
        // power = 2 + 3c + 0.5·c·e
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for c in [20.0, 30.0, 40.0, 50.0] {
            for e in [-20.0, -10.0, 0.0] {
                rows.extend_from_slice(&[c, e]);
                targets.push(2.0 + 3.0 * c + 0.5 * c * e);
            }
        }
        let x = DMatrix::from_row_slice(targets.len(), 2, &rows);
        let y = DVector::from_vec(targets);

        let model = PolynomialModel::fit("M", &x, &y).unwrap();
        let expected = [2.0, 3.0, 0.0, 0.0, 0.5, 0.0];
        for (got, want) in model.coefficients().iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{} vs {}", got, want);
        }
        assert!((model.predict_one(35.0, -5.0) - (2.0 + 105.0 - 87.5)).abs() < 1e-6);
    }

    #[test]
    fn test_underdetermined_fit_interpolates() {
        let x = DMatrix::from_row_slice(2, 2, &[30.0, -10.0, 40.0, 0.0]);
        let y = DVector::from_row_slice(&[500.0, 545.0]);

        let model = PolynomialModel::fit("MT064-4", &x, &y).unwrap();
        let predicted = model.predict(&x).unwrap();
        assert!((predicted[0] - 500.0).abs() < 1e-6);
        assert!((predicted[1] - 545.0).abs() < 1e-6);
    }

    #[test]
    fn test_underdetermined_fit_leaves_intercept_unpenalised() {
        // Each MT064-4 point predicted from the other two.
        let points = [(30.0, -10.0, 500.0), (35.0, -5.0, 520.0), (40.0, 0.0, 545.0)];
        let expected = [498.817071, 520.784480, 542.954501];

        for (held_out, want) in expected.iter().enumerate() {
            let train: Vec<_> = points
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != held_out)
                .map(|(_, p)| *p)
                .collect();
            let x = DMatrix::from_row_slice(2, 2, &[train[0].0, train[0].1, train[1].0, train[1].1]);
            let y = DVector::from_row_slice(&[train[0].2, train[1].2]);

            let model = PolynomialModel::fit("MT064-4", &x, &y).unwrap();
            let (c, e, _) = points[held_out];
            let got = model.predict_one(c, e);
            assert!((got - want).abs() < 1e-4, "row {}: {} vs {}", held_out, got, want);
        }
    }

    #[test]
    fn test_single_row_fit_predicts_the_row_everywhere() {
        let x = DMatrix::from_row_slice(1, 2, &[32.0, -8.0]);
        let y = DVector::from_row_slice(&[410.0]);

        let model = PolynomialModel::fit("ABC1", &x, &y).unwrap();
        assert_eq!(model.coefficients()[1..], [0.0; N_TERMS - 1]);
        assert!((model.predict_one(45.0, 5.0) - 410.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_matches_predict_one() {
        let model = PolynomialModel::new("M", vec![1.0, 2.0, 3.0, 0.1, 0.2, 0.3]).unwrap();
        let x = DMatrix::from_row_slice(1, 2, &[10.0, -4.0]);
        let batch = model.predict(&x).unwrap();
        assert!((batch[0] - model.predict_one(10.0, -4.0)).abs() < 1e-12);
    }

    #[test]
    fn test_new_rejects_wrong_coefficient_count() {
        assert!(PolynomialModel::new("M", vec![1.0, 2.0]).is_err());
    }
}
