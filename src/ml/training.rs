//! Regression training for a single compressor model

use super::grouping::ModelGroup;
use super::metrics::{r2_score, FitMetrics};
use super::models::PolynomialModel;
use super::{ModelError, Result};
use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Disjoint train/test partition of a model group's rows
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: DMatrix<f64>,
    pub x_test: DMatrix<f64>,
    pub y_train: DVector<f64>,
    pub y_test: DVector<f64>,
    /// Row indices of the group assigned to each side, in partition order
    pub train_rows: Vec<usize>,
    pub test_rows: Vec<usize>,
}

/// Polynomial power regression for one compressor model
///
/// Starts unfitted; [`fit_polynomial`](Self::fit_polynomial) or
/// [`load_fitted`](Self::load_fitted) move it to the fitted state, and a
/// later fit replaces the coefficients in place.
#[derive(Debug, Clone)]
pub struct CompressorRegressor {
    model_name: String,
    x: DMatrix<f64>,
    y: DVector<f64>,
    fitted: Option<PolynomialModel>,
}

impl CompressorRegressor {
    pub fn new(group: &ModelGroup) -> Result<Self> {
        if group.is_empty() {
            return Err(ModelError::InsufficientData {
                model: group.model.clone(),
                rows: 0,
                test_fraction: 0.0,
            });
        }

        let n = group.len();
        let inputs: Vec<f64> = group.observations.iter().flat_map(|o| o.inputs()).collect();
        let targets: Vec<f64> = group.observations.iter().map(|o| o.power).collect();

        Ok(Self {
            model_name: group.model.clone(),
            x: DMatrix::from_row_slice(n, 2, &inputs),
            y: DVector::from_vec(targets),
            fitted: None,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Input matrix (condenser, evaporator) in observation order
    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    /// Measured power in observation order
    pub fn y(&self) -> &DVector<f64> {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Split rows into train and test sets.
    ///
    /// `ceil(test_fraction · n)` rows go to the test set. Rows are shuffled by
    /// a ChaCha8 stream seeded with `seed`, so the same seed gives the same
    /// partition across builds and `rand` releases.
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ModelError::InvalidTestFraction(test_fraction));
        }

        let n = self.len();
        let n_test = (test_fraction * n as f64).ceil() as usize;
        let n_train = n.saturating_sub(n_test);
        if n_test == 0 || n_train == 0 {
            return Err(ModelError::InsufficientData {
                model: self.model_name.clone(),
                rows: n,
                test_fraction,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut permutation: Vec<usize> = (0..n).collect();
        permutation.shuffle(&mut rng);

        let (test_rows, train_rows) = permutation.split_at(n_test);
        debug!(
            model = %self.model_name,
            train = n_train,
            test = n_test,
            seed,
            "split model group"
        );

        Ok(TrainTestSplit {
            x_train: self.x.select_rows(train_rows),
            x_test: self.x.select_rows(test_rows),
            y_train: self.y.select_rows(train_rows),
            y_test: self.y.select_rows(test_rows),
            train_rows: train_rows.to_vec(),
            test_rows: test_rows.to_vec(),
        })
    }

    /// Fit the degree-2 polynomial regression, replacing any previous fit
    pub fn fit_polynomial(&mut self, x_train: &DMatrix<f64>, y_train: &DVector<f64>) -> Result<()> {
        let model = PolynomialModel::fit(self.model_name.clone(), x_train, y_train)?;
        debug!(model = %self.model_name, coefficients = ?model.coefficients(), "fitted polynomial regression");
        self.fitted = Some(model);
        Ok(())
    }

    /// Adopt previously persisted coefficients
    pub fn load_fitted(&mut self, model: PolynomialModel) {
        self.fitted = Some(model);
    }

    /// The fitted model, or `NotFitted`
    pub fn fitted(&self) -> Result<&PolynomialModel> {
        self.fitted.as_ref().ok_or_else(|| ModelError::NotFitted {
            model: self.model_name.clone(),
        })
    }

    pub fn predict(&self, inputs: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.fitted()?.predict(inputs)
    }

    /// R² of the predictions for `x_test` against `y_test`
    pub fn evaluate(&self, x_test: &DMatrix<f64>, y_test: &DVector<f64>) -> Result<f64> {
        let predicted = self.predict(x_test)?;
        r2_score(y_test.as_slice(), predicted.as_slice())
    }

    /// R², MAE and RMSE of the predictions for `x_test` against `y_test`
    pub fn evaluate_metrics(&self, x_test: &DMatrix<f64>, y_test: &DVector<f64>) -> Result<FitMetrics> {
        let predicted = self.predict(x_test)?;
        FitMetrics::calculate(y_test.as_slice(), predicted.as_slice())
    }
}
