//! Machine Learning Module
//!
//! Per-model power regressions for refrigeration compressors:
//! - Grouping observations by compressor model
//! - Degree-2 polynomial feature expansion
//! - Ordinary least squares fitting and evaluation
//! - Persistence of fitted coefficients
//!
//! # Architecture
//! A [`training::CompressorRegressor`] owns one model group's data and, once
//! fitted, a [`models::PolynomialModel`]. The model is the only thing that
//! reaches a [`store::ModelStore`]; the basis is a fixed constant rebuilt at
//! load time.

use thiserror::Error;

pub mod features;
pub mod grouping;
pub mod metrics;
pub mod models;
pub mod store;
pub mod training;

pub use grouping::{group_by_model, ModelGroup};
pub use metrics::{r2_score, FitMetrics};
pub use models::PolynomialModel;
pub use store::{FileModelStore, MemoryModelStore, ModelStore};
pub use training::{CompressorRegressor, TrainTestSplit};

/// Errors raised while training, evaluating or persisting a model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Insufficient data for model {model}: {rows} row(s) cannot be split with test fraction {test_fraction}")]
    InsufficientData {
        model: String,
        rows: usize,
        test_fraction: f64,
    },
    #[error("Test fraction must be strictly between 0 and 1, got {0}")]
    InvalidTestFraction(f64),
    #[error("Model {model} has not been fitted")]
    NotFitted { model: String },
    #[error("Persistence error for key '{key}': {source}")]
    Persistence {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Schema mismatch for key '{key}': expected {expected}, found {found}")]
    SchemaMismatch {
        key: String,
        expected: String,
        found: String,
    },
    #[error("Least squares solve failed for model {model}: {reason}")]
    Solve { model: String, reason: String },
    #[error("Dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: String, found: String },
}

impl ModelError {
    pub(crate) fn persistence(key: &str, source: std::io::Error) -> Self {
        ModelError::Persistence {
            key: key.to_string(),
            source,
        }
    }
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
