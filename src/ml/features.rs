//! Polynomial feature expansion
//!
//! The basis is fixed: all monomials of total degree ≤ 2 in the two inputs
//! (condenser, evaporator), in the order `1, x1, x2, x1², x1·x2, x2²`.
//! No scaling is applied.

use super::{ModelError, Result};
use nalgebra::DMatrix;

/// Polynomial degree of the basis
pub const DEGREE: u32 = 2;
/// Number of raw inputs (condenser, evaporator)
pub const N_INPUTS: usize = 2;
/// Number of expanded terms, including the bias
pub const N_TERMS: usize = 6;

pub const TERM_NAMES: [&str; N_TERMS] = [
    "1",
    "condenser_temp",
    "evaporator_temp",
    "condenser_temp^2",
    "condenser_temp*evaporator_temp",
    "evaporator_temp^2",
];

/// Expand one input pair into the degree-2 basis
pub fn expand_row(x1: f64, x2: f64) -> [f64; N_TERMS] {
    [1.0, x1, x2, x1 * x1, x1 * x2, x2 * x2]
}

/// Expand an `n × 2` input matrix into an `n × 6` design matrix
pub fn expand(inputs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if inputs.ncols() != N_INPUTS {
        return Err(ModelError::DimensionMismatch {
            expected: format!("{} input columns", N_INPUTS),
            found: format!("{} columns", inputs.ncols()),
        });
    }

    let mut data = Vec::with_capacity(inputs.nrows() * N_TERMS);
    for row in inputs.row_iter() {
        data.extend_from_slice(&expand_row(row[0], row[1]));
    }

    Ok(DMatrix::from_row_slice(inputs.nrows(), N_TERMS, &data))
}
