//! Per-model polynomial regressions of refrigeration compressor power draw.
//!
//! Observations of (condenser temperature, evaporator temperature, power) are
//! validated, grouped by compressor model and fitted with a degree-2
//! polynomial least squares regression per model. Fitted coefficients are
//! persisted so predictions can be reproduced without retraining.

pub mod config;
pub mod domain;
pub mod ml;
pub mod pipeline;
pub mod telemetry;
